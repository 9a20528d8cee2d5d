use kassa_core::DomainError;
use kassa_core::voucher::{ChannelGate, MIN_CHECK_CENTS, RedeemAttempt};
use sqlx::PgPool;
use uuid::Uuid;

use crate::StoreError;
use crate::models::ledger::LedgerEventKind;
use crate::models::voucher::Voucher;
use crate::services::ledger::credit_in_tx;

/// Check lifecycle. Creation debits the creator and holds the face value in
/// escrow (owned by no account); redemption is a checked-then-set state
/// transition that can fire at most once; deletion refunds the escrow.
#[derive(Debug, Clone)]
pub struct VoucherService {
    pool: PgPool,
}

impl VoucherService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, creator_id: i64, amount: i64) -> Result<Voucher, StoreError> {
        if amount < MIN_CHECK_CENTS {
            return Err(DomainError::InvalidAmount.into());
        }

        let mut tx = self.pool.begin().await?;

        // The amount cap is "current card balance"; an over-balance request
        // is an invalid amount, not an overdraft attempt.
        let balance: i64 =
            sqlx::query_scalar("SELECT card_balance FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(creator_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(DomainError::AccountNotFound)?;
        if amount > balance {
            return Err(DomainError::InvalidAmount.into());
        }

        sqlx::query("UPDATE accounts SET card_balance = card_balance - $1 WHERE id = $2")
            .bind(amount)
            .bind(creator_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO ledger_events (account_id, amount, kind) VALUES ($1, $2, $3)")
            .bind(creator_id)
            .bind(-amount)
            .bind(LedgerEventKind::CheckCreate.as_str())
            .execute(&mut *tx)
            .await?;

        let voucher = sqlx::query_as::<_, Voucher>(
            "INSERT INTO checks (creator_id, amount, code) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(creator_id)
        .bind(amount)
        .bind(Uuid::new_v4())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("Check {} created by {} for {} cents", voucher.id, creator_id, amount);
        Ok(voucher)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Voucher>, StoreError> {
        let v = sqlx::query_as::<_, Voucher>("SELECT * FROM checks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(v)
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<Voucher>, StoreError> {
        let Ok(code) = Uuid::parse_str(code) else {
            return Ok(None);
        };
        let v = sqlx::query_as::<_, Voucher>("SELECT * FROM checks WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(v)
    }

    /// Configuration is only permitted before redemption. A guarded update
    /// that matched nothing is disambiguated into not-found vs redeemed.
    async fn configured(&self, id: i64, rows_affected: u64) -> Result<(), StoreError> {
        if rows_affected > 0 {
            return Ok(());
        }
        match self.get(id).await? {
            None => Err(DomainError::VoucherNotFound.into()),
            Some(_) => Err(DomainError::AlreadyRedeemed.into()),
        }
    }

    pub async fn set_description(&self, id: i64, description: &str) -> Result<(), StoreError> {
        let res =
            sqlx::query("UPDATE checks SET description = $1 WHERE id = $2 AND redeemed_at IS NULL")
                .bind(description)
                .bind(id)
                .execute(&self.pool)
                .await?;
        self.configured(id, res.rows_affected()).await
    }

    pub async fn set_password(&self, id: i64, password: &str) -> Result<(), StoreError> {
        let res =
            sqlx::query("UPDATE checks SET password = $1 WHERE id = $2 AND redeemed_at IS NULL")
                .bind(password)
                .bind(id)
                .execute(&self.pool)
                .await?;
        self.configured(id, res.rows_affected()).await
    }

    pub async fn set_image(&self, id: i64, file_id: &str) -> Result<(), StoreError> {
        let res = sqlx::query(
            "UPDATE checks SET image_file_id = $1 WHERE id = $2 AND redeemed_at IS NULL",
        )
        .bind(file_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.configured(id, res.rows_affected()).await
    }

    pub async fn add_channel_gate(&self, id: i64, gate: ChannelGate) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let current: Option<(String, Option<chrono::DateTime<chrono::Utc>>)> = sqlx::query_as(
            "SELECT required_channels, redeemed_at FROM checks WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let (raw, redeemed_at) = current.ok_or(DomainError::VoucherNotFound)?;
        if redeemed_at.is_some() {
            return Err(DomainError::AlreadyRedeemed.into());
        }

        let mut gates: Vec<ChannelGate> = serde_json::from_str(&raw).unwrap_or_default();
        gates.push(gate);
        let encoded = serde_json::to_string(&gates)
            .map_err(|e| StoreError::Corrupt(format!("channel gates: {e}")))?;

        sqlx::query("UPDATE checks SET required_channels = $1 WHERE id = $2")
            .bind(encoded)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Flip the premium-only flag; returns the new value.
    pub async fn toggle_premium(&self, id: i64) -> Result<bool, StoreError> {
        let flag: Option<bool> = sqlx::query_scalar(
            "UPDATE checks SET premium_only = NOT premium_only WHERE id = $1 AND redeemed_at IS NULL RETURNING premium_only",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match flag {
            Some(flag) => Ok(flag),
            None => match self.get(id).await? {
                None => Err(DomainError::VoucherNotFound.into()),
                Some(_) => Err(DomainError::AlreadyRedeemed.into()),
            },
        }
    }

    /// Redeem a check. Channel memberships must have been resolved by the
    /// caller already (no network calls run while rows are locked). The
    /// redeemed-by/redeemed-at pair is set by a guarded update, making the
    /// transition exactly-once even under concurrent attempts.
    pub async fn redeem(
        &self,
        voucher_id: i64,
        redeemer_id: i64,
        password: Option<&str>,
        redeemer_premium: bool,
        memberships_ok: bool,
    ) -> Result<Voucher, StoreError> {
        let voucher = self
            .get(voucher_id)
            .await?
            .ok_or(DomainError::VoucherNotFound)?;

        let attempt = RedeemAttempt {
            redeemer: redeemer_id,
            creator: voucher.creator_id,
            redeemer_premium,
            memberships_ok,
            password,
        };
        voucher.gates().evaluate(voucher.is_redeemed(), &attempt)?;

        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE checks SET redeemed_by = $1, redeemed_at = CURRENT_TIMESTAMP WHERE id = $2 AND redeemed_at IS NULL",
        )
        .bind(redeemer_id)
        .bind(voucher_id)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            // Someone else redeemed or deleted it between our gate check
            // and here.
            return match self.get(voucher_id).await? {
                Some(_) => Err(DomainError::AlreadyRedeemed.into()),
                None => Err(DomainError::VoucherNotFound.into()),
            };
        }

        credit_in_tx(&mut tx, redeemer_id, voucher.amount, LedgerEventKind::CheckActivate).await?;

        tx.commit().await?;
        tracing::info!("Check {} redeemed by {}", voucher_id, redeemer_id);

        let redeemed = self
            .get(voucher_id)
            .await?
            .ok_or(DomainError::VoucherNotFound)?;
        Ok(redeemed)
    }

    /// Delete an unredeemed check and refund the escrowed amount to its
    /// creator; a pure inverse of [`create`].
    ///
    /// [`create`]: VoucherService::create
    pub async fn delete(&self, voucher_id: i64, requester: i64) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64, i64, Option<chrono::DateTime<chrono::Utc>>)> = sqlx::query_as(
            "SELECT creator_id, amount, redeemed_at FROM checks WHERE id = $1 FOR UPDATE",
        )
        .bind(voucher_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (creator_id, amount, redeemed_at) = row.ok_or(DomainError::VoucherNotFound)?;
        if redeemed_at.is_some() {
            return Err(DomainError::AlreadyRedeemed.into());
        }
        if creator_id != requester {
            return Err(DomainError::VoucherNotFound.into());
        }

        sqlx::query("DELETE FROM checks WHERE id = $1")
            .bind(voucher_id)
            .execute(&mut *tx)
            .await?;

        credit_in_tx(&mut tx, creator_id, amount, LedgerEventKind::CheckDelete).await?;

        tx.commit().await?;
        tracing::info!("Check {} deleted, {} cents refunded to {}", voucher_id, amount, creator_id);
        Ok(amount)
    }
}
