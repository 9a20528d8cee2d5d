use serde::{Deserialize, Serialize};

/// A paid subscription lasts this many days from the moment of purchase.
pub const SUBSCRIPTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionTier {
    EliteAccess,
    GoldTier,
    PrimePlus,
    VipNexus,
}

impl SubscriptionTier {
    pub const ALL: [SubscriptionTier; 4] = [
        SubscriptionTier::EliteAccess,
        SubscriptionTier::GoldTier,
        SubscriptionTier::PrimePlus,
        SubscriptionTier::VipNexus,
    ];

    /// Display name, also the value stored in `accounts.subscription_tier`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::EliteAccess => "Elite Access",
            SubscriptionTier::GoldTier => "Gold Tier",
            SubscriptionTier::PrimePlus => "Prime Plus",
            SubscriptionTier::VipNexus => "VIP Nexus",
        }
    }

    /// Short token used in callback data and invoice payloads.
    pub fn code(&self) -> &'static str {
        match self {
            SubscriptionTier::EliteAccess => "elite",
            SubscriptionTier::GoldTier => "gold",
            SubscriptionTier::PrimePlus => "prime",
            SubscriptionTier::VipNexus => "vip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.code() == s)
    }

    /// Queue priority: VIP > Prime > Gold > Elite > none (4..0).
    pub fn queue_priority(tier: Option<Self>) -> u8 {
        match tier {
            Some(SubscriptionTier::VipNexus) => 4,
            Some(SubscriptionTier::PrimePlus) => 3,
            Some(SubscriptionTier::GoldTier) => 2,
            Some(SubscriptionTier::EliteAccess) => 1,
            None => 0,
        }
    }

    /// Price when paying with Telegram Stars.
    pub fn price_stars(&self) -> u32 {
        match self {
            SubscriptionTier::EliteAccess => 30,
            SubscriptionTier::GoldTier => 55,
            SubscriptionTier::PrimePlus => 88,
            SubscriptionTier::VipNexus => 299,
        }
    }

    /// Price in USD cents when paying through the crypto gateway.
    pub fn price_usd_cents(&self) -> i64 {
        match self {
            SubscriptionTier::EliteAccess => 200,
            SubscriptionTier::GoldTier => 230,
            SubscriptionTier::PrimePlus => 300,
            SubscriptionTier::VipNexus => 400,
        }
    }

    /// Hourly payout boost granted by the tier, in USD cents.
    pub fn boost_hour_cents(&self) -> i64 {
        match self {
            SubscriptionTier::EliteAccess => 640,
            SubscriptionTier::GoldTier => 700,
            SubscriptionTier::PrimePlus => 900,
            SubscriptionTier::VipNexus => 1500,
        }
    }

    /// Half-hour payout boost, in USD cents.
    pub fn boost_half_hour_cents(&self) -> i64 {
        self.boost_hour_cents() / 2
    }

    /// Gold and above see the full ordered queue instead of a counter.
    pub fn sees_full_queue(&self) -> bool {
        matches!(
            self,
            SubscriptionTier::GoldTier | SubscriptionTier::PrimePlus | SubscriptionTier::VipNexus
        )
    }
}

/// Profit level derived from the referral count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfitTier {
    Rookie,
    Advanced,
    Worker,
    VipWork,
}

impl ProfitTier {
    pub fn from_referrals(count: i64) -> Self {
        if count < 10 {
            ProfitTier::Rookie
        } else if count < 30 {
            ProfitTier::Advanced
        } else if count < 60 {
            ProfitTier::Worker
        } else {
            ProfitTier::VipWork
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfitTier::Rookie => "rookie",
            ProfitTier::Advanced => "advanced",
            ProfitTier::Worker => "worker",
            ProfitTier::VipWork => "vip work",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_strictly_descending() {
        let mut seen = Vec::new();
        for tier in [
            Some(SubscriptionTier::VipNexus),
            Some(SubscriptionTier::PrimePlus),
            Some(SubscriptionTier::GoldTier),
            Some(SubscriptionTier::EliteAccess),
            None,
        ] {
            seen.push(SubscriptionTier::queue_priority(tier));
        }
        assert_eq!(seen, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn parse_accepts_name_and_code() {
        assert_eq!(
            SubscriptionTier::parse("VIP Nexus"),
            Some(SubscriptionTier::VipNexus)
        );
        assert_eq!(
            SubscriptionTier::parse("gold"),
            Some(SubscriptionTier::GoldTier)
        );
        assert_eq!(SubscriptionTier::parse("Platinum"), None);
    }

    #[test]
    fn profit_tier_thresholds() {
        assert_eq!(ProfitTier::from_referrals(0), ProfitTier::Rookie);
        assert_eq!(ProfitTier::from_referrals(10), ProfitTier::Advanced);
        assert_eq!(ProfitTier::from_referrals(59), ProfitTier::Worker);
        assert_eq!(ProfitTier::from_referrals(90), ProfitTier::VipWork);
    }
}
