use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::{HeatingBill, MeterReading};

pub const ENERGY_INSIGHTS_BASE_URL: &str = "https://energy-insights.tado.com";

#[derive(Debug, Error)]
pub enum InsightsApiError {
    #[error("failed to build http client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("energy insights request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("energy insights returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("energy insights returned malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("energy insights returned an unrecognized date: {0}")]
    Date(String),
}

/// A meter reading as listed by the vendor, with the record id needed for
/// deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterReadingRecord {
    pub id: i64,
    pub reading: MeterReading,
}

/// Status and body of a write the vendor acknowledged. Writes are logged,
/// never retried, and a non-2xx acknowledgement does not stop the run.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteAck {
    pub status: u16,
    pub body: String,
}

pub trait EnergyInsights {
    fn list_meter_readings(&self) -> Result<Vec<MeterReadingRecord>, InsightsApiError>;
    fn post_meter_reading(&self, reading: &MeterReading) -> Result<WriteAck, InsightsApiError>;
    fn delete_meter_reading(&self, id: i64) -> Result<WriteAck, InsightsApiError>;
    fn list_heating_bills(&self) -> Result<Vec<HeatingBill>, InsightsApiError>;
    fn post_heating_bill(&self, bill: &HeatingBill) -> Result<WriteAck, InsightsApiError>;
}

#[derive(Debug, Deserialize)]
struct ReadingsEnvelope {
    #[serde(default)]
    readings: Vec<WireReading>,
}

#[derive(Debug, Deserialize)]
struct WireReading {
    id: i64,
    date: String,
    reading: i64,
}

#[derive(Debug, Serialize)]
struct NewReading<'a> {
    date: &'a str,
    reading: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BillsEnvelope {
    #[serde(default)]
    heating_bills: Vec<WireBill>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBill {
    start_date: String,
    end_date: String,
    consumption: f64,
    unit_price_in_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewBill<'a> {
    start_date: &'a str,
    end_date: &'a str,
    consumption: f64,
    unit_price_in_cents: i64,
}

/// Client for the vendor's Energy Insights resource of one home: meter
/// readings and heating bills, both listed newest-first by the vendor.
pub struct TadoInsightsClient {
    http: reqwest::blocking::Client,
    base_url: String,
    home_id: u64,
    access_token: String,
}

impl TadoInsightsClient {
    pub fn new(base_url: &str, home_id: u64, access_token: &str) -> Result<Self, InsightsApiError> {
        let http = reqwest::blocking::Client::builder()
            .build()
            .map_err(InsightsApiError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            home_id,
            access_token: access_token.to_string(),
        })
    }

    fn resource_url(&self, resource: &str) -> String {
        format!("{}/api/homes/{}/{resource}", self.base_url, self.home_id)
    }

    fn get_json(&self, url: String) -> Result<String, InsightsApiError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(InsightsApiError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    fn send_write(&self, request: reqwest::blocking::RequestBuilder) -> Result<WriteAck, InsightsApiError> {
        let response = request.bearer_auth(&self.access_token).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;

        Ok(WriteAck { status, body })
    }
}

impl EnergyInsights for TadoInsightsClient {
    fn list_meter_readings(&self) -> Result<Vec<MeterReadingRecord>, InsightsApiError> {
        let body = self.get_json(self.resource_url("meterReadings"))?;
        let envelope: ReadingsEnvelope = serde_json::from_str(&body)?;

        envelope
            .readings
            .into_iter()
            .map(|wire| {
                Ok(MeterReadingRecord {
                    id: wire.id,
                    reading: MeterReading {
                        date: parse_date(&wire.date)?,
                        reading: wire.reading,
                    },
                })
            })
            .collect()
    }

    fn post_meter_reading(&self, reading: &MeterReading) -> Result<WriteAck, InsightsApiError> {
        let date = reading.date.to_string();
        let payload = NewReading {
            date: &date,
            reading: reading.reading,
        };

        self.send_write(
            self.http
                .post(self.resource_url("meterReadings"))
                .json(&payload),
        )
    }

    fn delete_meter_reading(&self, id: i64) -> Result<WriteAck, InsightsApiError> {
        let url = format!("{}/{id}", self.resource_url("meterReadings"));
        self.send_write(self.http.delete(url))
    }

    fn list_heating_bills(&self) -> Result<Vec<HeatingBill>, InsightsApiError> {
        let body = self.get_json(self.resource_url("heatingBills"))?;
        let envelope: BillsEnvelope = serde_json::from_str(&body)?;

        envelope
            .heating_bills
            .into_iter()
            .map(|wire| {
                Ok(HeatingBill {
                    start_date: parse_date(&wire.start_date)?,
                    end_date: parse_date(&wire.end_date)?,
                    consumption: wire.consumption,
                    unit_price_in_cents: wire.unit_price_in_cents,
                })
            })
            .collect()
    }

    fn post_heating_bill(&self, bill: &HeatingBill) -> Result<WriteAck, InsightsApiError> {
        let start_date = bill.start_date.to_string();
        let end_date = bill.end_date.to_string();
        let payload = NewBill {
            start_date: &start_date,
            end_date: &end_date,
            consumption: bill.consumption,
            unit_price_in_cents: bill.unit_price_in_cents,
        };

        self.send_write(
            self.http
                .post(self.resource_url("heatingBills"))
                .json(&payload),
        )
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, InsightsApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| InsightsApiError::Date(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::models::{HeatingBill, MeterReading};
    use crate::test_support::{StubHttpServer, StubResponse};

    use super::{EnergyInsights, InsightsApiError, TadoInsightsClient};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("test date must be valid")
    }

    #[test]
    fn lists_meter_readings_newest_first() {
        let server = StubHttpServer::start(vec![StubResponse::ok(
            r#"{"readings":[{"id":7,"date":"2025-01-05","reading":1920},{"id":3,"date":"2025-01-01","reading":1905}]}"#,
        )]);
        let client = TadoInsightsClient::new(server.base_url(), 1898784, "acc-1")
            .expect("client should build");

        let readings = client
            .list_meter_readings()
            .expect("listing should succeed");

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].id, 7);
        assert_eq!(readings[0].reading.date, date(2025, 1, 5));
        assert_eq!(readings[0].reading.reading, 1920);

        let requests = server.requests();
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].target, "/api/homes/1898784/meterReadings");
        assert_eq!(
            requests[0].header("Authorization"),
            Some("Bearer acc-1")
        );
    }

    #[test]
    fn empty_readings_list_deserializes() {
        let server = StubHttpServer::start(vec![StubResponse::ok("{}")]);
        let client = TadoInsightsClient::new(server.base_url(), 1898784, "acc-1")
            .expect("client should build");

        let readings = client
            .list_meter_readings()
            .expect("listing should succeed");

        assert!(readings.is_empty());
    }

    #[test]
    fn list_failure_is_an_error() {
        let server = StubHttpServer::start(vec![StubResponse::status(401, "unauthorized")]);
        let client = TadoInsightsClient::new(server.base_url(), 1898784, "stale")
            .expect("client should build");

        let result = client.list_meter_readings();

        assert!(matches!(
            result,
            Err(InsightsApiError::UnexpectedStatus { status: 401, .. })
        ));
    }

    #[test]
    fn posts_meter_reading_payload() {
        let server = StubHttpServer::start(vec![StubResponse::ok(r#"{"id":9}"#)]);
        let client = TadoInsightsClient::new(server.base_url(), 1898784, "acc-1")
            .expect("client should build");

        let ack = client
            .post_meter_reading(&MeterReading {
                date: date(2025, 1, 2),
                reading: 1905,
            })
            .expect("post should succeed");

        assert_eq!(ack.status, 200);

        let requests = server.requests();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].target, "/api/homes/1898784/meterReadings");
        assert_eq!(requests[0].body, r#"{"date":"2025-01-02","reading":1905}"#);
    }

    #[test]
    fn rejected_write_surfaces_as_ack_not_error() {
        let server = StubHttpServer::start(vec![StubResponse::status(
            422,
            r#"{"code":"readingConflict"}"#,
        )]);
        let client = TadoInsightsClient::new(server.base_url(), 1898784, "acc-1")
            .expect("client should build");

        let ack = client
            .post_meter_reading(&MeterReading {
                date: date(2025, 1, 2),
                reading: 1905,
            })
            .expect("rejected write should still return an ack");

        assert_eq!(ack.status, 422);
        assert!(ack.body.contains("readingConflict"));
    }

    #[test]
    fn deletes_meter_reading_by_id() {
        let server = StubHttpServer::start(vec![StubResponse::status(204, "")]);
        let client = TadoInsightsClient::new(server.base_url(), 1898784, "acc-1")
            .expect("client should build");

        let ack = client.delete_meter_reading(7).expect("delete should succeed");

        assert_eq!(ack.status, 204);
        let requests = server.requests();
        assert_eq!(requests[0].method, "DELETE");
        assert_eq!(requests[0].target, "/api/homes/1898784/meterReadings/7");
    }

    #[test]
    fn lists_and_posts_heating_bills() {
        let server = StubHttpServer::start(vec![
            StubResponse::ok(
                r#"{"heatingBills":[{"startDate":"2025-01-04","endDate":"2025-01-04","consumption":2.5,"unitPriceInCents":10}]}"#,
            ),
            StubResponse::ok(r#"{"id":12}"#),
        ]);
        let client = TadoInsightsClient::new(server.base_url(), 1898784, "acc-1")
            .expect("client should build");

        let bills = client.list_heating_bills().expect("listing should succeed");
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].end_date, date(2025, 1, 4));

        let ack = client
            .post_heating_bill(&HeatingBill {
                start_date: date(2025, 1, 5),
                end_date: date(2025, 1, 5),
                consumption: 3.25,
                unit_price_in_cents: 10,
            })
            .expect("post should succeed");
        assert_eq!(ack.status, 200);

        let requests = server.requests();
        assert_eq!(requests[1].target, "/api/homes/1898784/heatingBills");
        assert_eq!(
            requests[1].body,
            r#"{"startDate":"2025-01-05","endDate":"2025-01-05","consumption":3.25,"unitPriceInCents":10}"#
        );
    }
}
