mod common;

use chrono::{Duration, Utc};
use kassa_core::DomainError;
use kassa_core::queue::NumberKind;
use kassa_db::StoreError;
use kassa_db::services::{AccountService, QueueService};
use kassa_db::services::accounts::{MIN_WITHDRAW_CENTS, REFERRAL_BONUS_CENTS};

fn fresh_number() -> String {
    format!("9{:09}", rand::random::<u32>() % 1_000_000_000)
}

#[tokio::test]
async fn duplicate_numbers_are_rejected() {
    let Some(pool) = common::pool().await else { return };
    let queue = QueueService::new(pool.clone());
    let a = common::create_account(&pool).await;
    let b = common::create_account(&pool).await;

    let number = fresh_number();
    queue.enqueue(a, &number, NumberKind::Vc).await.unwrap();
    let err = queue.enqueue(b, &number, NumberKind::Vc).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(DomainError::DuplicatePhoneNumber)
    ));

    assert!(queue.remove(a, &number).await.unwrap());
    assert!(!queue.remove(a, &number).await.unwrap());
}

#[tokio::test]
async fn snapshot_ranks_by_tier_before_reputation_and_time() {
    let Some(pool) = common::pool().await else { return };
    let queue = QueueService::new(pool.clone());
    let vip = common::create_account(&pool).await;
    let gold = common::create_account(&pool).await;
    let plain = common::create_account(&pool).await;

    let end = Utc::now() + Duration::days(10);
    for (id, tier, rep) in [(vip, "VIP Nexus", 5.0), (gold, "Gold Tier", 50.0)] {
        sqlx::query(
            "UPDATE accounts SET subscription_tier = $1, subscription_end = $2, reputation = $3 WHERE id = $4",
        )
        .bind(tier)
        .bind(end)
        .bind(rep)
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();
    }

    let n_gold = fresh_number();
    let n_vip = fresh_number();
    let n_plain = fresh_number();
    // Insertion order deliberately does not match the expected rank.
    queue.enqueue(gold, &n_gold, NumberKind::Vc).await.unwrap();
    queue.enqueue(vip, &n_vip, NumberKind::Vc).await.unwrap();
    queue.enqueue(plain, &n_plain, NumberKind::Vc).await.unwrap();

    let snapshot = queue.ordered_snapshot().await.unwrap();
    let ours: Vec<&str> = snapshot
        .iter()
        .filter(|t| [vip, gold, plain].contains(&t.account_id))
        .map(|t| t.phone_number.as_str())
        .collect();
    assert_eq!(ours, vec![n_vip.as_str(), n_gold.as_str(), n_plain.as_str()]);
}

#[tokio::test]
async fn expired_subscription_ranks_as_none() {
    let Some(pool) = common::pool().await else { return };
    let queue = QueueService::new(pool.clone());
    let expired = common::create_account(&pool).await;

    sqlx::query(
        "UPDATE accounts SET subscription_tier = 'VIP Nexus', subscription_end = $1 WHERE id = $2",
    )
    .bind(Utc::now() - Duration::days(1))
    .bind(expired)
    .execute(&pool)
    .await
    .unwrap();

    let number = fresh_number();
    queue.enqueue(expired, &number, NumberKind::Vc).await.unwrap();
    let snapshot = queue.ordered_snapshot().await.unwrap();
    let ticket = snapshot
        .iter()
        .find(|t| t.account_id == expired)
        .expect("expired account queued");
    assert_eq!(ticket.tier, None);
}

#[tokio::test]
async fn referral_bonus_is_paid_exactly_once() {
    let Some(pool) = common::pool().await else { return };
    let accounts = AccountService::new(pool.clone());
    let referrer = common::create_account(&pool).await;
    let referee = common::create_account(&pool).await;

    let first = accounts.register_referral(referrer, referee).await.unwrap();
    assert_eq!(first, Some(REFERRAL_BONUS_CENTS));
    let second = accounts.register_referral(referrer, referee).await.unwrap();
    assert_eq!(second, None);
    assert_eq!(accounts.register_referral(referrer, referrer).await.unwrap(), None);

    let account = accounts.get_or_fail(referrer).await.unwrap();
    assert_eq!(account.referral_balance, REFERRAL_BONUS_CENTS);
    assert_eq!(account.referrals_count, 1);
    assert_eq!(account.profit_tier, "rookie");
}

#[tokio::test]
async fn withdraw_requests_settle_against_the_referral_balance() {
    let Some(pool) = common::pool().await else { return };
    let accounts = AccountService::new(pool.clone());
    let id = common::create_account(&pool).await;

    sqlx::query("UPDATE accounts SET referral_balance = 10000 WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    // Below the minimum.
    let err = accounts.create_withdraw(id, MIN_WITHDRAW_CENTS - 1).await.unwrap_err();
    assert!(matches!(err, StoreError::Domain(DomainError::InvalidAmount)));

    let request = accounts.create_withdraw(id, 6000).await.unwrap();
    assert_eq!(accounts.get_or_fail(id).await.unwrap().referral_balance, 4000);

    // Raising beyond the remaining balance fails and changes nothing.
    let err = accounts.edit_withdraw(id, request.id, 11000).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(DomainError::InsufficientFunds)
    ));
    assert_eq!(accounts.get_or_fail(id).await.unwrap().referral_balance, 4000);

    // Lowering refunds the difference.
    accounts.edit_withdraw(id, request.id, 5000).await.unwrap();
    assert_eq!(accounts.get_or_fail(id).await.unwrap().referral_balance, 5000);

    // Closing refunds the rest.
    accounts.close_withdraw(id, request.id).await.unwrap();
    assert_eq!(accounts.get_or_fail(id).await.unwrap().referral_balance, 10000);
    assert!(accounts.pending_withdraws(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn card_lifecycle() {
    let Some(pool) = common::pool().await else { return };
    let accounts = AccountService::new(pool.clone());
    let ledger = kassa_db::services::LedgerService::new(pool.clone());
    let id = common::create_account(&pool).await;

    // Test accounts start 'active'; reset to walk the full lifecycle.
    sqlx::query("UPDATE accounts SET card_status = 'inactive' WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let account = accounts.activate_card(id, "4321").await.unwrap().expect("activated");
    assert!(account.card_active());
    assert_eq!(account.card_number.as_ref().map(String::len), Some(16));
    assert_eq!(account.card_cvv.as_ref().map(String::len), Some(3));
    assert_eq!(account.card_password.as_deref(), Some("4321"));

    // A second activation attempt is refused.
    assert!(accounts.activate_card(id, "0000").await.unwrap().is_none());

    ledger
        .credit(id, 700, kassa_db::models::ledger::LedgerEventKind::Deposit)
        .await
        .unwrap();
    accounts.block_card(id).await.unwrap();

    let account = accounts.get_or_fail(id).await.unwrap();
    assert!(account.card_blocked());
    assert_eq!(account.card_balance, 0);
    // The write-off is on the ledger, so the replay invariant still holds.
    assert_eq!(ledger.event_sum(id).await.unwrap(), 0);
}
