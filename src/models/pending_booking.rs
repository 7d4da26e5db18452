use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Server-side resume context for a booking waiting on an external payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingBooking {
    pub token: String,
    pub consultant_username: String,
    pub client_username: String,
    pub availability_id: i64,
    pub date: NaiveDate,
    pub amount_minor: i64,
    pub payment_intent_id: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl PendingBooking {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at <= now
    }
}
