use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Smallest face value a check can carry: one dollar.
pub const MIN_CHECK_CENTS: i64 = 100;

/// One required-channel gate attached to a check: button label, join URL and
/// the bare channel handle used for the membership lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGate {
    pub name: String,
    pub url: String,
    pub channel: String,
}

impl ChannelGate {
    /// Parse the `Name https://t.me/channel` submission format.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (name, url) = input.rsplit_once(' ')?;
        let name = name.trim();
        if name.is_empty() || !url.starts_with("https://t.me/") {
            return None;
        }
        let channel = url.rsplit('/').next()?;
        if channel.is_empty() {
            return None;
        }
        Some(ChannelGate {
            name: name.to_string(),
            url: url.to_string(),
            channel: channel.to_string(),
        })
    }
}

/// The gating rules a check was configured with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedeemGates {
    pub premium_only: bool,
    pub required_channels: Vec<ChannelGate>,
    pub password: Option<String>,
}

/// Everything known about the redeemer at evaluation time. Channel
/// memberships must be resolved beforehand (the oracle may block on the
/// network and must not run inside a ledger transaction).
#[derive(Debug, Clone)]
pub struct RedeemAttempt<'a> {
    pub redeemer: i64,
    pub creator: i64,
    pub redeemer_premium: bool,
    pub memberships_ok: bool,
    pub password: Option<&'a str>,
}

impl RedeemGates {
    /// Evaluate the gates in their fixed order: already-redeemed, premium,
    /// channel membership, password. A failed password leaves the check
    /// redeemable; there is no lockout.
    pub fn evaluate(&self, already_redeemed: bool, attempt: &RedeemAttempt<'_>) -> Result<(), DomainError> {
        if already_redeemed {
            return Err(DomainError::AlreadyRedeemed);
        }
        if self.premium_only && !attempt.redeemer_premium && attempt.redeemer != attempt.creator {
            return Err(DomainError::PremiumRequired);
        }
        if !self.required_channels.is_empty() && !attempt.memberships_ok {
            return Err(DomainError::MembershipRequired);
        }
        if let Some(expected) = &self.password {
            match attempt.password {
                Some(given) if given == expected => {}
                _ => return Err(DomainError::WrongPassword),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(redeemer: i64) -> RedeemAttempt<'static> {
        RedeemAttempt {
            redeemer,
            creator: 1,
            redeemer_premium: false,
            memberships_ok: true,
            password: None,
        }
    }

    #[test]
    fn redeemed_check_fails_before_any_other_gate() {
        let gates = RedeemGates {
            premium_only: true,
            password: Some("1234".into()),
            ..Default::default()
        };
        assert_eq!(
            gates.evaluate(true, &attempt(2)),
            Err(DomainError::AlreadyRedeemed)
        );
    }

    #[test]
    fn premium_gate_does_not_apply_to_the_creator() {
        let gates = RedeemGates {
            premium_only: true,
            ..Default::default()
        };
        assert_eq!(
            gates.evaluate(false, &attempt(2)),
            Err(DomainError::PremiumRequired)
        );
        assert_eq!(gates.evaluate(false, &attempt(1)), Ok(()));
    }

    #[test]
    fn membership_is_checked_before_password() {
        let gates = RedeemGates {
            required_channels: vec![ChannelGate {
                name: "News".into(),
                url: "https://t.me/news".into(),
                channel: "news".into(),
            }],
            password: Some("1234".into()),
            ..Default::default()
        };
        let mut a = attempt(2);
        a.memberships_ok = false;
        a.password = Some("1234");
        assert_eq!(
            gates.evaluate(false, &a),
            Err(DomainError::MembershipRequired)
        );
    }

    #[test]
    fn wrong_password_leaves_the_check_redeemable() {
        let gates = RedeemGates {
            password: Some("1234".into()),
            ..Default::default()
        };
        let mut a = attempt(2);
        a.password = Some("0000");
        assert_eq!(gates.evaluate(false, &a), Err(DomainError::WrongPassword));
        // same gates, correct password: passes
        a.password = Some("1234");
        assert_eq!(gates.evaluate(false, &a), Ok(()));
    }

    #[test]
    fn channel_gate_parsing() {
        let gate = ChannelGate::parse("My Channel https://t.me/mychan").unwrap();
        assert_eq!(gate.name, "My Channel");
        assert_eq!(gate.channel, "mychan");
        assert!(ChannelGate::parse("justoneword").is_none());
        assert!(ChannelGate::parse("Name http://example.com/x").is_none());
    }
}
