use chrono::NaiveDate;

/// Cumulative meter value reported to the vendor for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterReading {
    pub date: NaiveDate,
    pub reading: i64,
}

/// One day's consumption expressed as a billing line item.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatingBill {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub consumption: f64,
    pub unit_price_in_cents: i64,
}

/// A retailer-reported, time-bounded usage record, reduced to its day
/// components. The retailer timestamps carry a time of day, but every
/// downstream decision only looks at the calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub consumption: f64,
}

/// One page of the retailer's paginated consumption resource. `next` is
/// the continuation URL, absent on the final page.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionPage {
    pub intervals: Vec<ConsumptionInterval>,
    pub next: Option<String>,
}

/// Access/refresh token pair issued by the vendor's OAuth endpoint. Only
/// the refresh token is ever persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionToken {
    pub access_token: String,
    pub refresh_token: String,
}
