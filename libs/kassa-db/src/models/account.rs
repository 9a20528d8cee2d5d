use chrono::{DateTime, Utc};
use kassa_core::tier::SubscriptionTier;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const CARD_INACTIVE: &str = "inactive";
pub const CARD_ACTIVE: &str = "active";
pub const CARD_BLOCKED: &str = "blocked";

/// How long a user-blocked card stays locked before it can be reactivated.
pub const CARD_LOCK_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: Option<String>,
    pub reputation: f64,
    /// Referral earnings in cents, spendable through withdraw requests.
    pub referral_balance: i64,
    /// Card balance in cents; a cached projection of the ledger event log.
    pub card_balance: i64,
    pub card_status: String,
    pub card_number: Option<String>,
    pub card_cvv: Option<String>,
    pub card_password: Option<String>,
    pub card_locked_at: Option<DateTime<Utc>>,
    pub subscription_tier: Option<String>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub referral_code: Option<String>,
    pub referrals_count: i64,
    pub profit_tier: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl Account {
    pub fn card_active(&self) -> bool {
        self.card_status == CARD_ACTIVE
    }

    pub fn card_blocked(&self) -> bool {
        self.card_status == CARD_BLOCKED
    }

    /// The subscription tier if one is set and not yet expired.
    pub fn active_tier(&self, now: DateTime<Utc>) -> Option<SubscriptionTier> {
        let tier = SubscriptionTier::parse(self.subscription_tier.as_deref()?)?;
        match self.subscription_end {
            Some(end) if end > now => Some(tier),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WithdrawRequest {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}
