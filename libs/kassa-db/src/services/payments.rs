use chrono::{Duration, Utc};
use kassa_core::DomainError;
use kassa_core::purpose::{PaymentPurpose, PaymentRail};
use kassa_core::tier::{SUBSCRIPTION_DAYS, SubscriptionTier};
use sqlx::{PgPool, Postgres, Transaction};

use crate::StoreError;
use crate::models::ledger::LedgerEventKind;
use crate::models::payment::{DepositRecord, PAYMENT_PAID, PaymentIntent};
use crate::services::ledger::credit_in_tx;

/// What a confirmed payment granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidEffect {
    Subscription(SubscriptionTier),
    /// Card credit in cents, after gateway conversion.
    Deposit { credited: i64 },
}

/// Payment intents and their reconciliation. The pending -> paid transition
/// is a guarded update; the granted effect runs in the same transaction, so
/// a duplicate confirmation can never credit twice. Gateway status lookups
/// happen in the bot layer, before any row here is locked.
#[derive(Debug, Clone)]
pub struct PaymentService {
    pool: PgPool,
}

impl PaymentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_intent(
        &self,
        account_id: i64,
        purpose: PaymentPurpose,
        rail: PaymentRail,
        amount: i64,
        payload: &str,
        invoice_id: Option<&str>,
    ) -> Result<PaymentIntent, StoreError> {
        if amount <= 0 {
            return Err(DomainError::InvalidAmount.into());
        }
        let intent = sqlx::query_as::<_, PaymentIntent>(
            "INSERT INTO payments (account_id, purpose, rail, amount, payload, invoice_id) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(account_id)
        .bind(purpose.as_db_str())
        .bind(rail.as_str())
        .bind(amount)
        .bind(payload)
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(intent)
    }

    pub async fn get(&self, id: i64) -> Result<Option<PaymentIntent>, StoreError> {
        let intent = sqlx::query_as::<_, PaymentIntent>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(intent)
    }

    /// Pull-side reconciliation: the caller has already observed `paid` from
    /// the gateway. Re-confirming an already-paid intent fails with
    /// `AlreadyReconciled` and leaves the ledger untouched.
    pub async fn reconcile_paid(
        &self,
        payment_id: i64,
        external_ref: Option<&str>,
    ) -> Result<PaidEffect, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64, String, String, i64)> = sqlx::query_as(
            "UPDATE payments SET status = 'paid', external_ref = $2, paid_at = CURRENT_TIMESTAMP \
             WHERE id = $1 AND status = 'pending' \
             RETURNING account_id, purpose, rail, amount",
        )
        .bind(payment_id)
        .bind(external_ref)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((account_id, purpose, rail, amount)) = row else {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM payments WHERE id = $1")
                    .bind(payment_id)
                    .fetch_optional(&self.pool)
                    .await?;
            return match status.as_deref() {
                Some(PAYMENT_PAID) => Err(DomainError::AlreadyReconciled.into()),
                Some(_) | None => Err(sqlx::Error::RowNotFound.into()),
            };
        };

        let effect = apply_paid_effect(&mut tx, payment_id, account_id, &purpose, &rail, amount).await?;
        tx.commit().await?;
        tracing::info!("Payment {} reconciled: {:?}", payment_id, effect);
        Ok(effect)
    }

    /// Push-side reconciliation for the Stars rail: a successful-payment
    /// update arrives with the invoice payload. Acts only if a pending
    /// intent matches both payload and payer; anything else (duplicate
    /// delivery, foreign payload) is a no-op.
    pub async fn reconcile_push(
        &self,
        payload: &str,
        payer_id: i64,
        external_ref: &str,
    ) -> Result<Option<PaidEffect>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64, i64, String, String, i64)> = sqlx::query_as(
            "UPDATE payments SET status = 'paid', external_ref = $3, paid_at = CURRENT_TIMESTAMP \
             WHERE payload = $1 AND account_id = $2 AND status = 'pending' \
             RETURNING id, account_id, purpose, rail, amount",
        )
        .bind(payload)
        .bind(payer_id)
        .bind(external_ref)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((payment_id, account_id, purpose, rail, amount)) = row else {
            return Ok(None);
        };

        let effect = apply_paid_effect(&mut tx, payment_id, account_id, &purpose, &rail, amount).await?;
        tx.commit().await?;
        tracing::info!("Payment {} reconciled via push: {:?}", payment_id, effect);
        Ok(Some(effect))
    }

    pub async fn deposits(&self, account_id: i64) -> Result<Vec<DepositRecord>, StoreError> {
        let records = sqlx::query_as::<_, DepositRecord>(
            "SELECT * FROM deposit_history WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

/// Grant whatever the intent bought. Runs inside the reconciliation
/// transaction, after the guarded status flip succeeded.
async fn apply_paid_effect(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: i64,
    account_id: i64,
    purpose: &str,
    rail: &str,
    amount: i64,
) -> Result<PaidEffect, StoreError> {
    let purpose = PaymentPurpose::parse_db(purpose)
        .ok_or_else(|| StoreError::Corrupt(format!("payment purpose: {purpose}")))?;
    let rail = PaymentRail::parse(rail)
        .ok_or_else(|| StoreError::Corrupt(format!("payment rail: {rail}")))?;

    match purpose {
        PaymentPurpose::Subscription(tier) => {
            let end = Utc::now() + Duration::days(SUBSCRIPTION_DAYS);
            let res = sqlx::query(
                "UPDATE accounts SET subscription_tier = $1, subscription_end = $2 WHERE id = $3",
            )
            .bind(tier.as_str())
            .bind(end)
            .bind(account_id)
            .execute(&mut **tx)
            .await?;
            if res.rows_affected() == 0 {
                return Err(DomainError::AccountNotFound.into());
            }
            Ok(PaidEffect::Subscription(tier))
        }
        PaymentPurpose::Deposit => {
            let credited = rail.credit_cents(amount);
            credit_in_tx(tx, account_id, credited, LedgerEventKind::Deposit).await?;
            sqlx::query(
                "INSERT INTO deposit_history (account_id, amount, payment_id) VALUES ($1, $2, $3)",
            )
            .bind(account_id)
            .bind(credited)
            .bind(payment_id)
            .execute(&mut **tx)
            .await?;
            Ok(PaidEffect::Deposit { credited })
        }
    }
}
