use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::models::{ConsumptionInterval, ConsumptionPage};

pub const OCTOPUS_BASE_URL: &str = "https://api.octopus.energy";

#[derive(Debug, Error)]
pub enum OctopusClientError {
    #[error("failed to build http client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("consumption request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("consumption response is malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("consumption interval has an unrecognized timestamp: {0}")]
    Timestamp(String),
}

/// Either the opening request of a reconciliation run or a continuation
/// of the retailer's cursor chain.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    First { period_from: NaiveDate },
    Next { url: String },
}

/// A non-success page status is data, not an error: the caller logs it
/// and stops paginating, keeping whatever total it accumulated so far.
#[derive(Debug, Clone, PartialEq)]
pub enum PageFetch {
    Page(ConsumptionPage),
    Rejected { status: u16, body: String },
}

pub trait ConsumptionFeed {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageFetch, OctopusClientError>;
}

#[derive(Debug, Deserialize)]
struct ConsumptionEnvelope {
    #[serde(default)]
    results: Vec<WireInterval>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireInterval {
    interval_start: String,
    interval_end: String,
    consumption: f64,
}

/// Client for the retailer's paginated gas-consumption resource, scoped
/// to one meter point. Requests authenticate with HTTP Basic, the API key
/// as username and an empty password.
pub struct OctopusClient {
    http: reqwest::blocking::Client,
    base_url: String,
    mprn: String,
    serial_number: String,
    api_key: String,
}

impl OctopusClient {
    pub fn new(
        base_url: &str,
        mprn: &str,
        serial_number: &str,
        api_key: &str,
    ) -> Result<Self, OctopusClientError> {
        let http = reqwest::blocking::Client::builder()
            .build()
            .map_err(OctopusClientError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            mprn: mprn.to_string(),
            serial_number: serial_number.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn first_page_url(&self, period_from: NaiveDate) -> String {
        format!(
            "{}/v1/gas-meter-points/{}/meters/{}/consumption/?group_by=day&period_from={}T00:00:00Z&order_by=period",
            self.base_url, self.mprn, self.serial_number, period_from
        )
    }
}

impl ConsumptionFeed for OctopusClient {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageFetch, OctopusClientError> {
        let url = match request {
            PageRequest::First { period_from } => self.first_page_url(*period_from),
            PageRequest::Next { url } => url.clone(),
        };

        let response = self
            .http
            .get(url)
            .basic_auth(&self.api_key, Some(""))
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Ok(PageFetch::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ConsumptionEnvelope = serde_json::from_str(&body)?;
        let intervals = envelope
            .results
            .iter()
            .map(parse_interval)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageFetch::Page(ConsumptionPage {
            intervals,
            next: envelope.next.filter(|next| !next.is_empty()),
        }))
    }
}

fn parse_interval(wire: &WireInterval) -> Result<ConsumptionInterval, OctopusClientError> {
    Ok(ConsumptionInterval {
        start: date_part(&wire.interval_start)?,
        end: date_part(&wire.interval_end)?,
        consumption: wire.consumption,
    })
}

/// Day component of an ISO-8601 timestamp such as
/// `2025-01-01T00:00:00+00:00`.
fn date_part(timestamp: &str) -> Result<NaiveDate, OctopusClientError> {
    timestamp
        .get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .ok_or_else(|| OctopusClientError::Timestamp(timestamp.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::test_support::{StubHttpServer, StubResponse};

    use super::{ConsumptionFeed, OctopusClient, OctopusClientError, PageFetch, PageRequest};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("test date must be valid")
    }

    fn client_for(server: &StubHttpServer) -> OctopusClient {
        OctopusClient::new(server.base_url(), "123456789", "G4-META-1", "sk_test")
            .expect("client should build")
    }

    #[test]
    fn first_page_url_matches_retailer_contract() {
        let server = StubHttpServer::start(vec![StubResponse::ok(r#"{"results":[]}"#)]);
        let client = client_for(&server);

        client
            .fetch_page(&PageRequest::First {
                period_from: date(2024, 12, 31),
            })
            .expect("fetch should succeed");

        let requests = server.requests();
        assert_eq!(
            requests[0].target,
            "/v1/gas-meter-points/123456789/meters/G4-META-1/consumption/?group_by=day&period_from=2024-12-31T00:00:00Z&order_by=period"
        );
        let auth = requests[0]
            .header("Authorization")
            .expect("basic auth header expected");
        assert!(auth.starts_with("Basic "));
    }

    #[test]
    fn parses_intervals_and_next_cursor() {
        let server = StubHttpServer::start(vec![StubResponse::ok(
            r#"{"count":2,"next":"https://api.octopus.energy/page2","results":[
                {"interval_start":"2025-01-01T00:00:00Z","interval_end":"2025-01-02T00:00:00Z","consumption":5.0},
                {"interval_start":"2025-01-02T00:00:00Z","interval_end":"2025-01-02T23:30:00Z","consumption":4.2}
            ]}"#,
        )]);
        let client = client_for(&server);

        let fetched = client
            .fetch_page(&PageRequest::First {
                period_from: date(2024, 12, 31),
            })
            .expect("fetch should succeed");

        let PageFetch::Page(page) = fetched else {
            panic!("expected a page");
        };
        assert_eq!(page.intervals.len(), 2);
        assert_eq!(page.intervals[0].start, date(2025, 1, 1));
        assert_eq!(page.intervals[0].end, date(2025, 1, 2));
        assert_eq!(page.intervals[0].consumption, 5.0);
        assert_eq!(
            page.next.as_deref(),
            Some("https://api.octopus.energy/page2")
        );
    }

    #[test]
    fn empty_next_terminates_pagination() {
        let server = StubHttpServer::start(vec![StubResponse::ok(
            r#"{"next":"","results":[]}"#,
        )]);
        let client = client_for(&server);

        let fetched = client
            .fetch_page(&PageRequest::First {
                period_from: date(2024, 12, 31),
            })
            .expect("fetch should succeed");

        let PageFetch::Page(page) = fetched else {
            panic!("expected a page");
        };
        assert_eq!(page.next, None);
    }

    #[test]
    fn non_success_status_is_a_rejection_not_an_error() {
        let server = StubHttpServer::start(vec![StubResponse::status(500, "server error")]);
        let client = client_for(&server);

        let fetched = client
            .fetch_page(&PageRequest::First {
                period_from: date(2024, 12, 31),
            })
            .expect("rejection should not be an error");

        assert_eq!(
            fetched,
            PageFetch::Rejected {
                status: 500,
                body: "server error".to_string(),
            }
        );
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let server = StubHttpServer::start(vec![StubResponse::ok(
            r#"{"results":[{"interval_start":"bogus","interval_end":"2025-01-02T00:00:00Z","consumption":1.0}]}"#,
        )]);
        let client = client_for(&server);

        let result = client.fetch_page(&PageRequest::First {
            period_from: date(2024, 12, 31),
        });

        assert!(matches!(result, Err(OctopusClientError::Timestamp(_))));
    }

    #[test]
    fn next_request_fetches_the_given_url() {
        let server = StubHttpServer::start(vec![StubResponse::ok(r#"{"results":[]}"#)]);
        let client = client_for(&server);

        client
            .fetch_page(&PageRequest::Next {
                url: server.url("/v1/page2?cursor=abc"),
            })
            .expect("fetch should succeed");

        let requests = server.requests();
        assert_eq!(requests[0].target, "/v1/page2?cursor=abc");
    }
}
