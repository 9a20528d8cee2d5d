use serde::{Deserialize, Serialize};

use crate::tier::SubscriptionTier;

/// Which gateway an intent was created against. Stars confirmations are
/// pushed by Telegram; CryptoPay confirmations are pulled on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentRail {
    Stars,
    CryptoPay,
}

impl PaymentRail {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRail::Stars => "stars",
            PaymentRail::CryptoPay => "cryptopay",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stars" => Some(PaymentRail::Stars),
            "cryptopay" => Some(PaymentRail::CryptoPay),
            _ => None,
        }
    }

    /// Convert a requested amount in gateway units into card cents.
    /// Stars: 2 stars per dollar, so one star is worth 50 cents.
    /// CryptoPay invoices are denominated in USD cents already.
    pub fn credit_cents(&self, requested: i64) -> i64 {
        match self {
            PaymentRail::Stars => requested * 50,
            PaymentRail::CryptoPay => requested,
        }
    }
}

/// What a payment intent buys once it is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentPurpose {
    Subscription(SubscriptionTier),
    Deposit,
}

impl PaymentPurpose {
    /// Value stored in `payments.purpose`.
    pub fn as_db_str(&self) -> String {
        match self {
            PaymentPurpose::Subscription(tier) => format!("subscription:{}", tier.as_str()),
            PaymentPurpose::Deposit => "deposit".to_string(),
        }
    }

    pub fn parse_db(s: &str) -> Option<Self> {
        if s == "deposit" {
            return Some(PaymentPurpose::Deposit);
        }
        let tier = s.strip_prefix("subscription:")?;
        SubscriptionTier::parse(tier).map(PaymentPurpose::Subscription)
    }

    /// Invoice payload carried through the gateway and back. The nonce keeps
    /// payloads unique so a stale invoice can never match a newer intent.
    pub fn to_payload_string(&self, account_id: i64, nonce: u64) -> String {
        match self {
            PaymentPurpose::Subscription(tier) => {
                format!("sub:{}:{}:{}", tier.code(), account_id, nonce)
            }
            PaymentPurpose::Deposit => format!("dep:{}:{}", account_id, nonce),
        }
    }

    /// Inverse of [`to_payload_string`]: returns the purpose and account id.
    pub fn parse_payload(payload: &str) -> Option<(Self, i64)> {
        let mut parts = payload.split(':');
        match parts.next()? {
            "sub" => {
                let tier = SubscriptionTier::parse(parts.next()?)?;
                let account = parts.next()?.parse().ok()?;
                parts.next()?;
                Some((PaymentPurpose::Subscription(tier), account))
            }
            "dep" => {
                let account = parts.next()?.parse().ok()?;
                parts.next()?;
                Some((PaymentPurpose::Deposit, account))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_codec() {
        let purpose = PaymentPurpose::Subscription(SubscriptionTier::VipNexus);
        let payload = purpose.to_payload_string(42, 7);
        assert_eq!(payload, "sub:vip:42:7");
        assert_eq!(
            PaymentPurpose::parse_payload(&payload),
            Some((purpose, 42))
        );

        let dep = PaymentPurpose::Deposit.to_payload_string(9, 1);
        assert_eq!(PaymentPurpose::parse_payload(&dep), Some((PaymentPurpose::Deposit, 9)));
    }

    #[test]
    fn payload_rejects_garbage() {
        assert_eq!(PaymentPurpose::parse_payload(""), None);
        assert_eq!(PaymentPurpose::parse_payload("sub:vip:42"), None);
        assert_eq!(PaymentPurpose::parse_payload("ref:42:1"), None);
    }

    #[test]
    fn conversion_rates() {
        // 20 stars = $10.00
        assert_eq!(PaymentRail::Stars.credit_cents(20), 1000);
        // crypto is 1:1 in cents
        assert_eq!(PaymentRail::CryptoPay.credit_cents(1000), 1000);
    }

    #[test]
    fn db_purpose_round_trip() {
        let p = PaymentPurpose::Subscription(SubscriptionTier::GoldTier);
        assert_eq!(p.as_db_str(), "subscription:Gold Tier");
        assert_eq!(PaymentPurpose::parse_db(&p.as_db_str()), Some(p));
        assert_eq!(
            PaymentPurpose::parse_db("deposit"),
            Some(PaymentPurpose::Deposit)
        );
        assert_eq!(PaymentPurpose::parse_db("subscription:Nope"), None);
    }
}
