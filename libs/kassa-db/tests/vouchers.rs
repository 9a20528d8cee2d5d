mod common;

use kassa_core::DomainError;
use kassa_db::StoreError;
use kassa_db::models::ledger::LedgerEventKind;
use kassa_db::services::{LedgerService, VoucherService};

async fn balance_of(pool: &sqlx::PgPool, id: i64) -> i64 {
    sqlx::query_scalar("SELECT card_balance FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("fetch balance")
}

#[tokio::test]
async fn create_then_delete_restores_the_creator_exactly() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let vouchers = VoucherService::new(pool.clone());
    let creator = common::create_account(&pool).await;
    ledger.credit(creator, 1000, LedgerEventKind::Deposit).await.unwrap();

    let voucher = vouchers.create(creator, 400).await.unwrap();
    assert_eq!(balance_of(&pool, creator).await, 600);

    let refunded = vouchers.delete(voucher.id, creator).await.unwrap();
    assert_eq!(refunded, 400);
    assert_eq!(balance_of(&pool, creator).await, 1000);
    assert_eq!(ledger.event_sum(creator).await.unwrap(), 1000);
    assert!(vouchers.get(voucher.id).await.unwrap().is_none());
}

#[tokio::test]
async fn create_rejects_bad_amounts() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let vouchers = VoucherService::new(pool.clone());
    let creator = common::create_account(&pool).await;
    ledger.credit(creator, 500, LedgerEventKind::Deposit).await.unwrap();

    for amount in [0, 99, 501] {
        let err = vouchers.create(creator, amount).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::InvalidAmount)));
    }
    assert_eq!(balance_of(&pool, creator).await, 500);
}

#[tokio::test]
async fn wrong_password_leaves_the_check_redeemable() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let vouchers = VoucherService::new(pool.clone());
    let creator = common::create_account(&pool).await;
    let redeemer = common::create_account(&pool).await;
    ledger.credit(creator, 1000, LedgerEventKind::Deposit).await.unwrap();

    let voucher = vouchers.create(creator, 300).await.unwrap();
    vouchers.set_password(voucher.id, "1234").await.unwrap();

    let err = vouchers
        .redeem(voucher.id, redeemer, Some("0000"), false, true)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Domain(DomainError::WrongPassword)));
    assert_eq!(balance_of(&pool, redeemer).await, 0);

    let redeemed = vouchers
        .redeem(voucher.id, redeemer, Some("1234"), false, true)
        .await
        .unwrap();
    assert_eq!(redeemed.redeemed_by, Some(redeemer));
    assert_eq!(balance_of(&pool, redeemer).await, 300);
}

#[tokio::test]
async fn concurrent_redemption_credits_exactly_one_redeemer() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let vouchers = VoucherService::new(pool.clone());
    let creator = common::create_account(&pool).await;
    let first = common::create_account(&pool).await;
    let second = common::create_account(&pool).await;
    ledger.credit(creator, 1000, LedgerEventKind::Deposit).await.unwrap();

    let voucher = vouchers.create(creator, 500).await.unwrap();

    let (r1, r2) = tokio::join!(
        vouchers.redeem(voucher.id, first, None, false, true),
        vouchers.redeem(voucher.id, second, None, false, true),
    );
    let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "a check is redeemed exactly once");

    let credited = balance_of(&pool, first).await + balance_of(&pool, second).await;
    assert_eq!(credited, 500);

    let stored = vouchers.get(voucher.id).await.unwrap().unwrap();
    assert!(stored.is_redeemed());
}

#[tokio::test]
async fn redeemed_checks_cannot_be_configured_or_deleted() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let vouchers = VoucherService::new(pool.clone());
    let creator = common::create_account(&pool).await;
    let redeemer = common::create_account(&pool).await;
    ledger.credit(creator, 1000, LedgerEventKind::Deposit).await.unwrap();

    let voucher = vouchers.create(creator, 200).await.unwrap();
    vouchers.redeem(voucher.id, redeemer, None, false, true).await.unwrap();

    let err = vouchers.set_description(voucher.id, "late").await.unwrap_err();
    assert!(matches!(err, StoreError::Domain(DomainError::AlreadyRedeemed)));

    let err = vouchers.delete(voucher.id, creator).await.unwrap_err();
    assert!(matches!(err, StoreError::Domain(DomainError::AlreadyRedeemed)));

    let err = vouchers
        .redeem(voucher.id, creator, None, false, true)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Domain(DomainError::AlreadyRedeemed)));
}

#[tokio::test]
async fn only_the_creator_may_delete() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let vouchers = VoucherService::new(pool.clone());
    let creator = common::create_account(&pool).await;
    let stranger = common::create_account(&pool).await;
    ledger.credit(creator, 1000, LedgerEventKind::Deposit).await.unwrap();

    let voucher = vouchers.create(creator, 200).await.unwrap();
    let err = vouchers.delete(voucher.id, stranger).await.unwrap_err();
    assert!(matches!(err, StoreError::Domain(DomainError::VoucherNotFound)));
    assert!(vouchers.get(voucher.id).await.unwrap().is_some());
}

#[tokio::test]
async fn lookup_by_code_round_trips() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let vouchers = VoucherService::new(pool.clone());
    let creator = common::create_account(&pool).await;
    ledger.credit(creator, 1000, LedgerEventKind::Deposit).await.unwrap();

    let voucher = vouchers.create(creator, 150).await.unwrap();
    let found = vouchers
        .get_by_code(&voucher.code.to_string())
        .await
        .unwrap()
        .expect("voucher by code");
    assert_eq!(found.id, voucher.id);

    assert!(vouchers.get_by_code("not-a-uuid").await.unwrap().is_none());
}
