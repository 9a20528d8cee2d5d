use chrono::{DateTime, Utc};
use kassa_core::purpose::{PaymentPurpose, PaymentRail};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const PAYMENT_PENDING: &str = "pending";
pub const PAYMENT_PAID: &str = "paid";

/// A tracked request to receive external payment confirmation before
/// granting an in-system effect. Transitions pending -> paid exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentIntent {
    pub id: i64,
    pub account_id: i64,
    /// `subscription:<tier>` or `deposit`.
    pub purpose: String,
    /// `stars` or `cryptopay`.
    pub rail: String,
    /// Requested amount in gateway units: a star count on the Stars rail,
    /// USD cents on CryptoPay. Converted to card cents at credit time.
    pub amount: i64,
    pub payload: Option<String>,
    pub invoice_id: Option<String>,
    pub status: String,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentIntent {
    pub fn is_paid(&self) -> bool {
        self.status == PAYMENT_PAID
    }

    pub fn purpose_parsed(&self) -> Option<PaymentPurpose> {
        PaymentPurpose::parse_db(&self.purpose)
    }

    pub fn rail_parsed(&self) -> Option<PaymentRail> {
        PaymentRail::parse(&self.rail)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DepositRecord {
    pub id: i64,
    pub account_id: i64,
    /// Credited card amount in cents (after gateway conversion).
    pub amount: i64,
    pub payment_id: i64,
    pub created_at: DateTime<Utc>,
}
