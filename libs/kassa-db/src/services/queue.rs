use chrono::{DateTime, Utc};
use kassa_core::DomainError;
use kassa_core::queue::{NumberKind, QueueTicket, sorted};
use sqlx::PgPool;

use crate::StoreError;
use crate::models::queue::{BlockedRow, QueueRow, SuccessfulRow, WorkingRow};

/// Pending phone-number entries. The table holds no ordering; the admin
/// side reads [`ordered_snapshot`], a view recomputed on every call.
///
/// [`ordered_snapshot`]: QueueService::ordered_snapshot
#[derive(Debug, Clone)]
pub struct QueueService {
    pool: PgPool,
}

impl QueueService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a number, enforcing uniqueness across queued and in-progress
    /// entries. The pre-check gives a friendly error; the UNIQUE constraint
    /// closes the race window between two simultaneous submissions.
    pub async fn enqueue(
        &self,
        account_id: i64,
        phone_number: &str,
        kind: NumberKind,
    ) -> Result<QueueRow, StoreError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM queue WHERE phone_number = $1) \
             OR EXISTS(SELECT 1 FROM working WHERE phone_number = $1)",
        )
        .bind(phone_number)
        .fetch_one(&self.pool)
        .await?;
        if taken {
            return Err(DomainError::DuplicatePhoneNumber.into());
        }

        let row = sqlx::query_as::<_, QueueRow>(
            "INSERT INTO queue (account_id, phone_number, kind) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(account_id)
        .bind(phone_number)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Domain(DomainError::DuplicatePhoneNumber)
            }
            _ => StoreError::Sqlx(e),
        })?;
        Ok(row)
    }

    /// Remove a queued number owned by this account; true if one was there.
    pub async fn remove(&self, account_id: i64, phone_number: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM queue WHERE phone_number = $1 AND account_id = $2")
            .bind(phone_number)
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn len(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn user_entries(&self, account_id: i64) -> Result<Vec<QueueRow>, StoreError> {
        let rows = sqlx::query_as::<_, QueueRow>(
            "SELECT * FROM queue WHERE account_id = $1 ORDER BY enqueued_at ASC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn working_for(&self, account_id: i64) -> Result<Vec<WorkingRow>, StoreError> {
        let rows = sqlx::query_as::<_, WorkingRow>("SELECT * FROM working WHERE account_id = $1")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn successful_for(&self, account_id: i64) -> Result<Vec<SuccessfulRow>, StoreError> {
        let rows =
            sqlx::query_as::<_, SuccessfulRow>("SELECT * FROM successful WHERE account_id = $1")
                .bind(account_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn blocked_for(&self, account_id: i64) -> Result<Vec<BlockedRow>, StoreError> {
        let rows = sqlx::query_as::<_, BlockedRow>("SELECT * FROM blocked WHERE account_id = $1")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// The full queue ranked for the work pipeline: tier priority, then
    /// reputation, then submission time. Expired subscriptions rank as none.
    pub async fn ordered_snapshot(&self) -> Result<Vec<QueueTicket>, StoreError> {
        type Joined = (
            i64,
            i64,
            String,
            String,
            DateTime<Utc>,
            Option<String>,
            Option<DateTime<Utc>>,
            f64,
        );
        let rows: Vec<Joined> = sqlx::query_as(
            "SELECT q.id, q.account_id, q.phone_number, q.kind, q.enqueued_at, \
                    a.subscription_tier, a.subscription_end, a.reputation \
             FROM queue q JOIN accounts a ON a.id = q.account_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        let tickets = rows
            .into_iter()
            .map(|(id, account_id, phone_number, kind, enqueued_at, tier, end, reputation)| {
                let tier = tier
                    .as_deref()
                    .and_then(kassa_core::tier::SubscriptionTier::parse)
                    .filter(|_| end.is_some_and(|end| end > now));
                QueueTicket {
                    id,
                    account_id,
                    phone_number,
                    kind: NumberKind::parse(&kind).unwrap_or(NumberKind::Vc),
                    enqueued_at,
                    tier,
                    reputation,
                }
            })
            .collect();

        Ok(sorted(tickets))
    }
}
