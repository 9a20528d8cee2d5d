use kassa_core::DomainError;
use sqlx::{PgPool, Postgres, Transaction};

use crate::StoreError;
use crate::models::ledger::{LedgerEvent, LedgerEventKind};

/// Card-balance mutations. Every mutation appends a ledger event and updates
/// the cached balance inside one transaction; no observer can see one
/// without the other. The account row is taken `FOR UPDATE` first, so the
/// check-and-mutate pair can never interleave with a concurrent spend.
#[derive(Debug, Clone)]
pub struct LedgerService {
    pool: PgPool,
}

/// Credit `account_id` inside an open transaction. The caller owns commit.
pub(crate) async fn credit_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    account_id: i64,
    amount: i64,
    kind: LedgerEventKind,
) -> Result<(), StoreError> {
    let locked: Option<i64> =
        sqlx::query_scalar("SELECT card_balance FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(account_id)
            .fetch_optional(&mut **tx)
            .await?;
    if locked.is_none() {
        return Err(DomainError::AccountNotFound.into());
    }

    sqlx::query("UPDATE accounts SET card_balance = card_balance + $1 WHERE id = $2")
        .bind(amount)
        .bind(account_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query("INSERT INTO ledger_events (account_id, amount, kind) VALUES ($1, $2, $3)")
        .bind(account_id)
        .bind(amount)
        .bind(kind.as_str())
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Debit `account_id` inside an open transaction; fails with
/// `InsufficientFunds` without touching anything if the locked balance is
/// too small.
pub(crate) async fn debit_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    account_id: i64,
    amount: i64,
    kind: LedgerEventKind,
) -> Result<(), StoreError> {
    let balance: i64 =
        sqlx::query_scalar("SELECT card_balance FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(account_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(DomainError::AccountNotFound)?;

    if balance < amount {
        return Err(DomainError::InsufficientFunds.into());
    }

    sqlx::query("UPDATE accounts SET card_balance = card_balance - $1 WHERE id = $2")
        .bind(amount)
        .bind(account_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query("INSERT INTO ledger_events (account_id, amount, kind) VALUES ($1, $2, $3)")
        .bind(account_id)
        .bind(-amount)
        .bind(kind.as_str())
        .execute(&mut **tx)
        .await?;

    Ok(())
}

impl LedgerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn credit(
        &self,
        account_id: i64,
        amount: i64,
        kind: LedgerEventKind,
    ) -> Result<(), StoreError> {
        if amount <= 0 {
            return Err(DomainError::InvalidAmount.into());
        }
        let mut tx = self.pool.begin().await?;
        credit_in_tx(&mut tx, account_id, amount, kind).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn debit(
        &self,
        account_id: i64,
        amount: i64,
        kind: LedgerEventKind,
    ) -> Result<(), StoreError> {
        if amount <= 0 {
            return Err(DomainError::InvalidAmount.into());
        }
        let mut tx = self.pool.begin().await?;
        debit_in_tx(&mut tx, account_id, amount, kind).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Move `amount` between two cards as one atomic unit; either both legs
    /// apply or neither does. Self-transfer is rejected before any balance
    /// check.
    pub async fn transfer(&self, from: i64, to: i64, amount: i64) -> Result<(), StoreError> {
        if from == to {
            return Err(DomainError::SelfTransfer.into());
        }
        if amount <= 0 {
            return Err(DomainError::InvalidAmount.into());
        }

        let mut tx = self.pool.begin().await?;

        // Lock both rows in id order so two opposite transfers cannot
        // deadlock each other.
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT id, card_balance FROM accounts WHERE id IN ($1, $2) ORDER BY id FOR UPDATE",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&mut *tx)
        .await?;
        if rows.len() != 2 {
            return Err(DomainError::AccountNotFound.into());
        }

        let from_balance = rows
            .iter()
            .find(|(id, _)| *id == from)
            .map(|(_, b)| *b)
            .ok_or(DomainError::AccountNotFound)?;
        if from_balance < amount {
            return Err(DomainError::InsufficientFunds.into());
        }

        sqlx::query("UPDATE accounts SET card_balance = card_balance - $1 WHERE id = $2")
            .bind(amount)
            .bind(from)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE accounts SET card_balance = card_balance + $1 WHERE id = $2")
            .bind(amount)
            .bind(to)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO ledger_events (account_id, amount, kind) VALUES ($1, $2, $3)")
            .bind(from)
            .bind(-amount)
            .bind(LedgerEventKind::TransferOut.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO ledger_events (account_id, amount, kind) VALUES ($1, $2, $3)")
            .bind(to)
            .bind(amount)
            .bind(LedgerEventKind::TransferIn.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO transfers (from_account, to_account, amount) VALUES ($1, $2, $3)")
            .bind(from)
            .bind(to)
            .bind(amount)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Transferred {} cents from {} to {}", amount, from, to);
        Ok(())
    }

    /// Statement feed, newest first.
    pub async fn history(&self, account_id: i64) -> Result<Vec<LedgerEvent>, StoreError> {
        let events = sqlx::query_as::<_, LedgerEvent>(
            "SELECT * FROM ledger_events WHERE account_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    /// Replay of the event log; must always equal the cached balance.
    pub async fn event_sum(&self, account_id: i64) -> Result<i64, StoreError> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS BIGINT) FROM ledger_events WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum)
    }

    /// Counterparty for a transfer event, for statement rendering.
    pub async fn transfer_peer(
        &self,
        account_id: i64,
        event: &LedgerEvent,
    ) -> Result<Option<i64>, StoreError> {
        let peer: Option<i64> = match LedgerEventKind::parse(&event.kind) {
            Some(LedgerEventKind::TransferIn) => {
                sqlx::query_scalar(
                    "SELECT from_account FROM transfers WHERE to_account = $1 AND amount = $2 AND created_at = $3",
                )
                .bind(account_id)
                .bind(event.amount)
                .bind(event.created_at)
                .fetch_optional(&self.pool)
                .await?
            }
            Some(LedgerEventKind::TransferOut) => {
                sqlx::query_scalar(
                    "SELECT to_account FROM transfers WHERE from_account = $1 AND amount = $2 AND created_at = $3",
                )
                .bind(account_id)
                .bind(-event.amount)
                .bind(event.created_at)
                .fetch_optional(&self.pool)
                .await?
            }
            _ => None,
        };
        Ok(peer)
    }
}
