use chrono::Utc;
use kassa_core::DomainError;
use kassa_core::tier::ProfitTier;
use rand::Rng;
use sqlx::PgPool;

use crate::StoreError;
use crate::models::account::{Account, CARD_LOCK_DAYS, WithdrawRequest};
use crate::models::ledger::LedgerEventKind;

/// Paid to the referrer for every new referral, in cents.
pub const REFERRAL_BONUS_CENTS: i64 = 50;

/// Minimum referral-balance withdrawal, in cents.
pub const MIN_WITHDRAW_CENTS: i64 = 5000;

#[derive(Debug, Clone)]
pub struct AccountService {
    pool: PgPool,
}

impl AccountService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, id: i64, username: Option<&str>) -> Result<Account, StoreError> {
        let referral_code = format!("ref_{id}");
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, username, referral_code, last_activity)
            VALUES ($1, $2, $3, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                username = COALESCE(excluded.username, accounts.username),
                last_activity = CURRENT_TIMESTAMP
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(&referral_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    pub async fn get_or_fail(&self, id: i64) -> Result<Account, StoreError> {
        self.get(id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound.into())
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Record a referral once and pay the bonus to the referrer's referral
    /// balance. Duplicate or self referrals return Ok(None).
    pub async fn register_referral(
        &self,
        referrer_id: i64,
        referee_id: i64,
    ) -> Result<Option<i64>, StoreError> {
        if referrer_id == referee_id {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO referrals (referrer_id, referee_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(referrer_id)
        .bind(referee_id)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(None);
        }

        let count: Option<i64> = sqlx::query_scalar(
            "UPDATE accounts SET referral_balance = referral_balance + $1, \
             referrals_count = referrals_count + 1 WHERE id = $2 RETURNING referrals_count",
        )
        .bind(REFERRAL_BONUS_CENTS)
        .bind(referrer_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(count) = count else {
            // Referral link pointed at an account we have never seen.
            return Ok(None);
        };

        sqlx::query("UPDATE accounts SET profit_tier = $1 WHERE id = $2")
            .bind(ProfitTier::from_referrals(count).as_str())
            .bind(referrer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(REFERRAL_BONUS_CENTS))
    }

    /// Activate an inactive card: store the PIN and mint fresh credentials.
    /// Returns None when the card is not in the inactive state.
    pub async fn activate_card(&self, id: i64, pin: &str) -> Result<Option<Account>, StoreError> {
        let (number, cvv) = generate_card_credentials();
        let account = sqlx::query_as::<_, Account>(
            "UPDATE accounts SET card_status = 'active', card_number = $1, card_cvv = $2, \
             card_password = $3, card_locked_at = NULL WHERE id = $4 AND card_status = 'inactive' \
             RETURNING *",
        )
        .bind(number)
        .bind(cvv)
        .bind(pin)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// User-initiated block: write off the remaining balance with a
    /// `withdraw` event and lock the card for [`CARD_LOCK_DAYS`].
    pub async fn block_card(&self, id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let balance: i64 =
            sqlx::query_scalar("SELECT card_balance FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(DomainError::AccountNotFound)?;

        if balance > 0 {
            sqlx::query("UPDATE accounts SET card_balance = 0 WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("INSERT INTO ledger_events (account_id, amount, kind) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(-balance)
                .bind(LedgerEventKind::Withdraw.as_str())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "UPDATE accounts SET card_status = 'blocked', card_locked_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Release an expired user lock back to the inactive state, clearing the
    /// stored credentials. Returns the refreshed account.
    pub async fn refresh_card_lock(&self, account: Account) -> Result<Account, StoreError> {
        let lock_expired = account.card_blocked()
            && account
                .card_locked_at
                .is_some_and(|at| Utc::now() - at >= chrono::Duration::days(CARD_LOCK_DAYS));
        if !lock_expired {
            return Ok(account);
        }

        let refreshed = sqlx::query_as::<_, Account>(
            "UPDATE accounts SET card_status = 'inactive', card_number = NULL, card_cvv = NULL, \
             card_password = NULL, card_locked_at = NULL WHERE id = $1 AND card_status = 'blocked' \
             RETURNING *",
        )
        .bind(account.id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(refreshed.unwrap_or(account))
    }

    /// Open a withdraw request against the referral balance.
    pub async fn create_withdraw(
        &self,
        account_id: i64,
        amount: i64,
    ) -> Result<WithdrawRequest, StoreError> {
        if amount < MIN_WITHDRAW_CENTS {
            return Err(DomainError::InvalidAmount.into());
        }

        let mut tx = self.pool.begin().await?;

        let balance: i64 =
            sqlx::query_scalar("SELECT referral_balance FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(account_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(DomainError::AccountNotFound)?;
        if balance < amount {
            return Err(DomainError::InsufficientFunds.into());
        }

        sqlx::query("UPDATE accounts SET referral_balance = referral_balance - $1 WHERE id = $2")
            .bind(amount)
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        let request = sqlx::query_as::<_, WithdrawRequest>(
            "INSERT INTO withdraw_requests (account_id, amount) VALUES ($1, $2) RETURNING *",
        )
        .bind(account_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(request)
    }

    /// Change the amount of a pending request; the delta settles against the
    /// referral balance in the same transaction.
    pub async fn edit_withdraw(
        &self,
        account_id: i64,
        request_id: i64,
        new_amount: i64,
    ) -> Result<(), StoreError> {
        if new_amount < MIN_WITHDRAW_CENTS {
            return Err(DomainError::InvalidAmount.into());
        }

        let mut tx = self.pool.begin().await?;

        let old_amount: i64 = sqlx::query_scalar(
            "SELECT amount FROM withdraw_requests \
             WHERE id = $1 AND account_id = $2 AND status = 'pending' FOR UPDATE",
        )
        .bind(request_id)
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

        let diff = new_amount - old_amount;
        if diff > 0 {
            let balance: i64 =
                sqlx::query_scalar("SELECT referral_balance FROM accounts WHERE id = $1 FOR UPDATE")
                    .bind(account_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if balance < diff {
                return Err(DomainError::InsufficientFunds.into());
            }
        }
        if diff != 0 {
            sqlx::query("UPDATE accounts SET referral_balance = referral_balance - $1 WHERE id = $2")
                .bind(diff)
                .bind(account_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE withdraw_requests SET amount = $1 WHERE id = $2")
            .bind(new_amount)
            .bind(request_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Close a pending request and refund its amount.
    pub async fn close_withdraw(&self, account_id: i64, request_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let amount: i64 = sqlx::query_scalar(
            "SELECT amount FROM withdraw_requests \
             WHERE id = $1 AND account_id = $2 AND status = 'pending' FOR UPDATE",
        )
        .bind(request_id)
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

        sqlx::query("UPDATE accounts SET referral_balance = referral_balance + $1 WHERE id = $2")
            .bind(amount)
            .bind(account_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE withdraw_requests SET status = 'closed' WHERE id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn pending_withdraws(
        &self,
        account_id: i64,
    ) -> Result<Vec<WithdrawRequest>, StoreError> {
        let rows = sqlx::query_as::<_, WithdrawRequest>(
            "SELECT * FROM withdraw_requests WHERE account_id = $1 AND status = 'pending' ORDER BY id DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn paid_withdraws(
        &self,
        account_id: i64,
    ) -> Result<Vec<WithdrawRequest>, StoreError> {
        let rows = sqlx::query_as::<_, WithdrawRequest>(
            "SELECT * FROM withdraw_requests WHERE account_id = $1 AND status = 'paid' ORDER BY paid_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn withdraw_request(
        &self,
        account_id: i64,
        request_id: i64,
    ) -> Result<Option<WithdrawRequest>, StoreError> {
        let row = sqlx::query_as::<_, WithdrawRequest>(
            "SELECT * FROM withdraw_requests WHERE id = $1 AND account_id = $2",
        )
        .bind(request_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

fn generate_card_credentials() -> (String, String) {
    let mut rng = rand::rng();
    let number: String = (0..16)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect();
    let cvv: String = (0..3)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect();
    (number, cvv)
}
