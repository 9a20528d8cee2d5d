use chrono::{DateTime, Utc};
use kassa_core::voucher::{ChannelGate, RedeemGates};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A prepaid check. The face amount was debited from the creator at
/// creation and sits in escrow until redemption or deletion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Voucher {
    pub id: i64,
    pub creator_id: i64,
    pub amount: i64,
    pub code: Uuid,
    pub description: Option<String>,
    pub password: Option<String>,
    pub image_file_id: Option<String>,
    /// JSON-encoded list of [`ChannelGate`]s.
    pub required_channels: String,
    pub premium_only: bool,
    pub redeemed_by: Option<i64>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Voucher {
    pub fn is_redeemed(&self) -> bool {
        self.redeemed_at.is_some()
    }

    pub fn channel_gates(&self) -> Vec<ChannelGate> {
        serde_json::from_str(&self.required_channels).unwrap_or_default()
    }

    pub fn gates(&self) -> RedeemGates {
        RedeemGates {
            premium_only: self.premium_only,
            required_channels: self.channel_gates(),
            password: self.password.clone(),
        }
    }
}
