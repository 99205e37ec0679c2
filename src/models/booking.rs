use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const MAX_SPECIAL_REQUESTS_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    CheckedIn,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::Completed => "completed",
        }
    }

    /// `pending -> confirmed -> checked_in -> completed`, and
    /// `pending | confirmed -> cancelled`. Nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Confirmed, BookingStatus::CheckedIn)
                | (BookingStatus::CheckedIn, BookingStatus::Completed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Refunded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Eft,
    CreditCard,
    Cash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProof {
    pub url: String,
    pub remote_id: String,
    pub verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub reason: Option<String>,
    pub cancelled_by: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: String,
    pub property: String,
    pub user: String,
    /// Check-in day (inclusive).
    pub start_date: NaiveDate,
    /// Check-out day (exclusive).
    pub end_date: NaiveDate,
    pub guests: u32,
    pub total_price: f64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub special_requests: Option<String>,
    pub payment_proof: Option<PaymentProof>,
    pub cancellation: Option<Cancellation>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Half-open interval test against `[start, end)`.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        ranges_overlap(start, end, self.start_date, self.end_date)
    }

    /// Every night this booking occupies, i.e. each day in `[start, end)`.
    pub fn nights(&self) -> Vec<NaiveDate> {
        nights_in(self.start_date, self.end_date)
    }
}

/// `[s, e)` and `[s2, e2)` intersect iff `s < e2 && e > s2`. Touching ranges
/// (one ends the day the other starts) do not.
pub fn ranges_overlap(s: NaiveDate, e: NaiveDate, s2: NaiveDate, e2: NaiveDate) -> bool {
    s < e2 && e > s2
}

/// Longest stay a single booking may cover.
pub const MAX_STAY_NIGHTS: i64 = 365;

pub fn nights_in(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day < end).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_guests")]
    pub guests: u32,
    pub payment_method: PaymentMethod,
    pub special_requests: Option<String>,
}

fn default_guests() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPatch {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub guests: Option<u32>,
    pub payment_method: Option<PaymentMethod>,
    pub special_requests: Option<String>,
}

impl BookingPatch {
    /// True when either end of the stay is being set, even to its current
    /// value. Such patches go back through the availability check.
    pub fn touches_dates(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingQuery {
    pub status: Option<BookingStatus>,
    pub property: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    pub property: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub available: bool,
    pub nights: i64,
    pub total_price: f64,
}

pub fn validate_special_requests(text: Option<&str>) -> Result<(), String> {
    match text {
        Some(text) if text.chars().count() > MAX_SPECIAL_REQUESTS_LEN => Err(format!(
            "Special requests cannot exceed {} characters",
            MAX_SPECIAL_REQUESTS_LEN
        )),
        _ => Ok(()),
    }
}
