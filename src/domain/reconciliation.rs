use chrono::NaiveDate;

use crate::domain::models::{ConsumptionInterval, HeatingBill, MeterReading};

/// Baseline used when the vendor has no recorded readings yet.
pub const SEED_READING: i64 = 1900;

/// Price applied to every heating-bill line item.
pub const UNIT_PRICE_IN_CENTS: i64 = 10;

/// Which vendor resource the reconciliation writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    MeterReadings,
    HeatingBills,
}

/// The vendor's last known meter state, from which the catch-up starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingBaseline {
    pub date: NaiveDate,
    pub reading: i64,
}

impl ReadingBaseline {
    pub fn seed() -> Self {
        Self {
            date: seed_date(),
            reading: SEED_READING,
        }
    }

    pub fn from_latest(latest: Option<&MeterReading>) -> Self {
        match latest {
            Some(reading) => Self {
                date: reading.date,
                reading: reading.reading,
            },
            None => Self::seed(),
        }
    }
}

pub fn seed_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).expect("seed date is a valid calendar date")
}

/// Starting date for the heating-bill variant, which tracks no reading
/// value, only the end date of the most recent bill.
pub fn bill_baseline_date(latest_end: Option<NaiveDate>) -> NaiveDate {
    latest_end.unwrap_or_else(seed_date)
}

/// The vendor is current once its latest record covers yesterday. Today's
/// consumption is never available from the retailer yet, so yesterday is
/// the newest day worth writing.
pub fn vendor_is_current(latest: NaiveDate, today: NaiveDate) -> bool {
    latest >= today - chrono::Days::new(1)
}

pub fn crosses_day_boundary(interval: &ConsumptionInterval) -> bool {
    interval.start != interval.end
}

/// Result of planning one page of intervals in meter-reading mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingPlan {
    pub posts: Vec<MeterReading>,
    pub page_consumption: f64,
    pub running_reading: f64,
}

/// Folds a page of intervals into the running meter value and decides
/// which cumulative readings get written. A reading is written only for
/// intervals that cross a calendar-day boundary; the accumulation itself
/// covers every interval regardless.
pub fn plan_reading_posts(running_reading: f64, intervals: &[ConsumptionInterval]) -> ReadingPlan {
    let mut running = running_reading;
    let mut page_consumption = 0.0;
    let mut posts = Vec::new();

    for interval in intervals {
        page_consumption += interval.consumption;
        running += interval.consumption;

        if crosses_day_boundary(interval) {
            posts.push(MeterReading {
                date: interval.end,
                reading: running.round() as i64,
            });
        }
    }

    ReadingPlan {
        posts,
        page_consumption,
        running_reading: running,
    }
}

/// Result of planning one page of intervals in heating-bill mode.
#[derive(Debug, Clone, PartialEq)]
pub struct BillPlan {
    pub posts: Vec<HeatingBill>,
    pub page_consumption: f64,
}

/// Bill lines gate on the opposite day-boundary condition from readings:
/// a bill is written only for intervals confined to a single calendar day.
pub fn plan_bill_posts(intervals: &[ConsumptionInterval]) -> BillPlan {
    let mut page_consumption = 0.0;
    let mut posts = Vec::new();

    for interval in intervals {
        page_consumption += interval.consumption;

        if !crosses_day_boundary(interval) {
            posts.push(HeatingBill {
                start_date: interval.start,
                end_date: interval.end,
                consumption: interval.consumption,
                unit_price_in_cents: UNIT_PRICE_IN_CENTS,
            });
        }
    }

    BillPlan {
        posts,
        page_consumption,
    }
}
