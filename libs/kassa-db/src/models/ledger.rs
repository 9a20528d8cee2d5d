use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// What moved money on the card ledger. The event log is append-only; the
/// `accounts.card_balance` column is a projection of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEventKind {
    CheckCreate,
    CheckDelete,
    CheckActivate,
    TransferIn,
    TransferOut,
    Withdraw,
    Deposit,
}

impl LedgerEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEventKind::CheckCreate => "check_create",
            LedgerEventKind::CheckDelete => "check_delete",
            LedgerEventKind::CheckActivate => "check_activate",
            LedgerEventKind::TransferIn => "transfer_in",
            LedgerEventKind::TransferOut => "transfer_out",
            LedgerEventKind::Withdraw => "withdraw",
            LedgerEventKind::Deposit => "deposit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "check_create" => Some(LedgerEventKind::CheckCreate),
            "check_delete" => Some(LedgerEventKind::CheckDelete),
            "check_activate" => Some(LedgerEventKind::CheckActivate),
            "transfer_in" => Some(LedgerEventKind::TransferIn),
            "transfer_out" => Some(LedgerEventKind::TransferOut),
            "withdraw" => Some(LedgerEventKind::Withdraw),
            "deposit" => Some(LedgerEventKind::Deposit),
            _ => None,
        }
    }

    /// Whether an event of this kind credits the account.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            LedgerEventKind::CheckDelete
                | LedgerEventKind::CheckActivate
                | LedgerEventKind::TransferIn
                | LedgerEventKind::Deposit
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEvent {
    pub id: i64,
    pub account_id: i64,
    /// Signed amount in cents; credits positive, debits negative.
    pub amount: i64,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: i64,
    pub from_account: i64,
    pub to_account: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}
