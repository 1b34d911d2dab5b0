use chrono::{Local, NaiveDate};
use thiserror::Error;

use crate::adapters::browser_login::{BrowserLoginError, HeadlessChromeLogin, LoginDriver};
use crate::adapters::octopus::{
    ConsumptionFeed, OCTOPUS_BASE_URL, OctopusClient, OctopusClientError, PageFetch, PageRequest,
};
use crate::adapters::tado_auth::{
    ActivationStatus, AuthError, TADO_AUTH_BASE_URL, TadoAuthClient,
};
use crate::adapters::tado_eiq::{
    ENERGY_INSIGHTS_BASE_URL, EnergyInsights, InsightsApiError, TadoInsightsClient,
};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::domain::models::{MeterReading, SessionToken};
use crate::domain::reconciliation::{
    self, ReadingBaseline, ReconcileMode, bill_baseline_date, plan_bill_posts, plan_reading_posts,
    vendor_is_current,
};

pub trait Clock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to initialize vendor session: {0}")]
    AuthSetup(#[source] AuthError),
    #[error("device activation failed: {0}")]
    Activation(#[source] AuthError),
    #[error("interactive login failed: {0}")]
    Login(#[source] BrowserLoginError),
    #[error("token refresh failed: {0}")]
    TokenRefresh(#[source] AuthError),
    #[error("failed to read vendor meter state: {0}")]
    VendorState(#[source] InsightsApiError),
    #[error("failed to send vendor record: {0}")]
    VendorWrite(#[source] InsightsApiError),
    #[error("consumption request failed: {0}")]
    Consumption(#[source] OctopusClientError),
}

/// Makes sure a vendor session can be refreshed: if activation is still
/// pending, walk the interactive login once and finalize the grant. A
/// final status other than Completed is logged and deliberately not
/// fatal; the following token refresh surfaces the real failure if the
/// session is actually unusable.
pub fn establish_session<D: LoginDriver>(
    auth: &mut TadoAuthClient,
    driver: &D,
    email: &str,
    password: &str,
) -> Result<(), SyncError> {
    let mut status = auth.begin_session().map_err(SyncError::Activation)?;

    if status == ActivationStatus::Pending {
        if let Some(url) = auth.verification_url() {
            let url = url.to_string();
            driver
                .complete_login(&url, email, password)
                .map_err(SyncError::Login)?;
        }
        status = auth.complete_activation().map_err(SyncError::Activation)?;
    }

    match status {
        ActivationStatus::Completed => tracing::info!("login successful"),
        other => tracing::warn!(status = ?other, "device activation did not complete"),
    }

    Ok(())
}

/// Brings the vendor's meter state up to date with the retailer's latest
/// daily consumption and returns the total consumption accumulated in
/// this run.
pub fn reconcile<E, O, C>(
    insights: &E,
    feed: &O,
    mode: ReconcileMode,
    clock: &C,
) -> Result<f64, SyncError>
where
    E: EnergyInsights,
    O: ConsumptionFeed,
    C: Clock,
{
    let baseline = load_baseline(insights, mode)?;
    let today = clock.today();
    tracing::info!(latest = %baseline.date, today = %today, "vendor baseline loaded");

    if vendor_is_current(baseline.date, today) {
        tracing::info!(latest = %baseline.date, "already sent a record for yesterday");
        return Ok(0.0);
    }

    let mut total = 0.0;
    let mut running = baseline.reading as f64;
    let mut request = PageRequest::First {
        period_from: baseline.date,
    };

    loop {
        let fetched = feed.fetch_page(&request).map_err(SyncError::Consumption)?;
        let page = match fetched {
            PageFetch::Page(page) => page,
            PageFetch::Rejected { status, body } => {
                tracing::warn!(status, body = %body, "consumption page rejected, stopping pagination");
                break;
            }
        };

        match mode {
            ReconcileMode::MeterReadings => {
                let plan = plan_reading_posts(running, &page.intervals);
                total += plan.page_consumption;
                running = plan.running_reading;

                for reading in &plan.posts {
                    let ack = insights
                        .post_meter_reading(reading)
                        .map_err(SyncError::VendorWrite)?;
                    tracing::info!(
                        date = %reading.date,
                        reading = reading.reading,
                        status = ack.status,
                        body = %ack.body,
                        "meter reading sent"
                    );
                }
            }
            ReconcileMode::HeatingBills => {
                let plan = plan_bill_posts(&page.intervals);
                total += plan.page_consumption;

                for bill in &plan.posts {
                    let ack = insights
                        .post_heating_bill(bill)
                        .map_err(SyncError::VendorWrite)?;
                    tracing::info!(
                        start = %bill.start_date,
                        end = %bill.end_date,
                        consumption = bill.consumption,
                        status = ack.status,
                        "heating bill sent"
                    );
                }
            }
        }

        match page.next {
            Some(url) => request = PageRequest::Next { url },
            None => break,
        }
    }

    tracing::info!(total_consumption = total, "reconciliation finished");
    Ok(total)
}

fn load_baseline<E: EnergyInsights>(
    insights: &E,
    mode: ReconcileMode,
) -> Result<ReadingBaseline, SyncError> {
    match mode {
        ReconcileMode::MeterReadings => {
            let readings = insights
                .list_meter_readings()
                .map_err(SyncError::VendorState)?;
            Ok(ReadingBaseline::from_latest(
                readings.first().map(|record| &record.reading),
            ))
        }
        ReconcileMode::HeatingBills => {
            let bills = insights
                .list_heating_bills()
                .map_err(SyncError::VendorState)?;
            Ok(ReadingBaseline {
                date: bill_baseline_date(bills.first().map(|bill| bill.end_date)),
                reading: reconciliation::SEED_READING,
            })
        }
    }
}

/// Overwrites the vendor's aggregate meter value with one reading dated
/// today. Not part of the sync flow; exposed through the push binary.
pub fn push_total<E: EnergyInsights, C: Clock>(
    insights: &E,
    reading: i64,
    clock: &C,
) -> Result<(), SyncError> {
    let record = MeterReading {
        date: clock.today(),
        reading,
    };
    let ack = insights
        .post_meter_reading(&record)
        .map_err(SyncError::VendorWrite)?;
    tracing::info!(
        date = %record.date,
        reading,
        status = ack.status,
        body = %ack.body,
        "total reading pushed"
    );

    Ok(())
}

/// Deletes every meter reading the vendor has for the home. Utility path
/// exposed through the purge binary.
pub fn purge_readings<E: EnergyInsights>(insights: &E) -> Result<usize, SyncError> {
    let readings = insights
        .list_meter_readings()
        .map_err(SyncError::VendorState)?;
    let count = readings.len();

    for record in readings {
        let ack = insights
            .delete_meter_reading(record.id)
            .map_err(SyncError::VendorWrite)?;
        tracing::info!(
            id = record.id,
            date = %record.reading.date,
            status = ack.status,
            "meter reading deleted"
        );
    }

    Ok(count)
}

pub fn run_sync(config: AppConfig) -> Result<(), AppError> {
    let (mprn, serial_number, api_key) = config.retailer_meter()?;
    let session = connect(&config).map_err(AppError::runtime)?;

    let insights =
        TadoInsightsClient::new(ENERGY_INSIGHTS_BASE_URL, config.home_id, &session.access_token)
            .map_err(AppError::runtime)?;
    let feed = OctopusClient::new(OCTOPUS_BASE_URL, &mprn, &serial_number, &api_key)
        .map_err(AppError::runtime)?;

    let total = reconcile(&insights, &feed, config.mode, &SystemClock).map_err(AppError::runtime)?;
    tracing::info!(total_consumption = total, "sync finished");

    Ok(())
}

pub fn run_push_total(config: AppConfig) -> Result<(), AppError> {
    let reading = config.push_reading()?;
    let session = connect(&config).map_err(AppError::runtime)?;

    let insights =
        TadoInsightsClient::new(ENERGY_INSIGHTS_BASE_URL, config.home_id, &session.access_token)
            .map_err(AppError::runtime)?;

    push_total(&insights, reading, &SystemClock).map_err(AppError::runtime)
}

pub fn run_purge_readings(config: AppConfig) -> Result<(), AppError> {
    let session = connect(&config).map_err(AppError::runtime)?;

    let insights =
        TadoInsightsClient::new(ENERGY_INSIGHTS_BASE_URL, config.home_id, &session.access_token)
            .map_err(AppError::runtime)?;

    let count = purge_readings(&insights).map_err(AppError::runtime)?;
    tracing::info!(count, "meter readings purged");

    Ok(())
}

fn connect(config: &AppConfig) -> Result<SessionToken, SyncError> {
    let mut auth = TadoAuthClient::new(TADO_AUTH_BASE_URL, config.token_file.clone())
        .map_err(SyncError::AuthSetup)?;

    establish_session(
        &mut auth,
        &HeadlessChromeLogin,
        &config.tado_email,
        &config.tado_password,
    )?;

    let session = auth.refresh_session().map_err(SyncError::TokenRefresh)?;
    tracing::info!("session token refreshed");

    Ok(session)
}
