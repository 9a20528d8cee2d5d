use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tier::SubscriptionTier;

/// The two kinds of numbers the work pipeline accepts, with their submission
/// formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberKind {
    /// Full international format: `+7` followed by ten digits.
    Max,
    /// Short format: ten digits starting with `9`.
    Vc,
}

impl NumberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberKind::Max => "max",
            NumberKind::Vc => "vc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "max" => Some(NumberKind::Max),
            "vc" => Some(NumberKind::Vc),
            _ => None,
        }
    }

    pub fn format_hint(&self) -> &'static str {
        match self {
            NumberKind::Max => "+7XXXXXXXXXX",
            NumberKind::Vc => "9XXXXXXXXX",
        }
    }

    pub fn validate(&self, number: &str) -> bool {
        match self {
            NumberKind::Max => {
                number
                    .strip_prefix("+7")
                    .is_some_and(|rest| rest.len() == 10 && rest.bytes().all(|b| b.is_ascii_digit()))
            }
            NumberKind::Vc => {
                number.len() == 10
                    && number.starts_with('9')
                    && number.bytes().all(|b| b.is_ascii_digit())
            }
        }
    }
}

/// One queued number joined with the ranking attributes of its owner.
/// This is a read-side view; the persisted rows carry no ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueTicket {
    pub id: i64,
    pub account_id: i64,
    pub phone_number: String,
    pub kind: NumberKind,
    pub enqueued_at: DateTime<Utc>,
    pub tier: Option<SubscriptionTier>,
    pub reputation: f64,
}

/// Total order over tickets: tier priority descending, reputation
/// descending, enqueue time ascending, row id ascending. The id fallback
/// keeps the order deterministic for fully equal keys.
pub fn rank(a: &QueueTicket, b: &QueueTicket) -> Ordering {
    let pa = SubscriptionTier::queue_priority(a.tier);
    let pb = SubscriptionTier::queue_priority(b.tier);
    pb.cmp(&pa)
        .then_with(|| b.reputation.total_cmp(&a.reputation))
        .then_with(|| a.enqueued_at.cmp(&b.enqueued_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sorted(mut tickets: Vec<QueueTicket>) -> Vec<QueueTicket> {
    tickets.sort_by(rank);
    tickets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ticket(id: i64, tier: Option<SubscriptionTier>, rep: f64, t: i64) -> QueueTicket {
        QueueTicket {
            id,
            account_id: id,
            phone_number: format!("900000000{id}"),
            kind: NumberKind::Vc,
            enqueued_at: Utc.timestamp_opt(t, 0).unwrap(),
            tier,
            reputation: rep,
        }
    }

    #[test]
    fn tier_dominates_reputation_and_time() {
        let out = sorted(vec![
            ticket(1, Some(SubscriptionTier::VipNexus), 5.0, 1),
            ticket(2, Some(SubscriptionTier::GoldTier), 50.0, 0),
            ticket(3, None, 5.0, 2),
        ]);
        let ids: Vec<i64> = out.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn reputation_breaks_ties_within_tier() {
        let out = sorted(vec![
            ticket(1, Some(SubscriptionTier::GoldTier), 10.0, 0),
            ticket(2, Some(SubscriptionTier::GoldTier), 20.0, 5),
        ]);
        assert_eq!(out[0].id, 2);
    }

    #[test]
    fn fifo_within_equal_tier_and_reputation() {
        let out = sorted(vec![
            ticket(2, None, 10.0, 9),
            ticket(1, None, 10.0, 3),
        ]);
        assert_eq!(out[0].id, 1);
    }

    #[test]
    fn id_fallback_makes_order_deterministic() {
        let a = ticket(1, None, 10.0, 3);
        let b = ticket(2, None, 10.0, 3);
        assert_eq!(rank(&a, &b), Ordering::Less);
        assert_eq!(rank(&b, &a), Ordering::Greater);
    }

    #[test]
    fn number_validation() {
        assert!(NumberKind::Max.validate("+79991234567"));
        assert!(!NumberKind::Max.validate("79991234567"));
        assert!(!NumberKind::Max.validate("+7999123456"));
        assert!(!NumberKind::Max.validate("+7999123456a"));
        assert!(NumberKind::Vc.validate("9991234567"));
        assert!(!NumberKind::Vc.validate("8991234567"));
        assert!(!NumberKind::Vc.validate("999123456"));
    }
}
