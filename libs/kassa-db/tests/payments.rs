mod common;

use chrono::Utc;
use kassa_core::DomainError;
use kassa_core::purpose::{PaymentPurpose, PaymentRail};
use kassa_core::tier::SubscriptionTier;
use kassa_db::StoreError;
use kassa_db::services::{PaidEffect, PaymentService};

async fn balance_of(pool: &sqlx::PgPool, id: i64) -> i64 {
    sqlx::query_scalar("SELECT card_balance FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("fetch balance")
}

#[tokio::test]
async fn reconciling_a_deposit_twice_credits_once() {
    let Some(pool) = common::pool().await else { return };
    let payments = PaymentService::new(pool.clone());
    let account = common::create_account(&pool).await;

    // 20 stars requested: worth $10.00 on the card.
    let payload = PaymentPurpose::Deposit.to_payload_string(account, 1);
    let intent = payments
        .create_intent(account, PaymentPurpose::Deposit, PaymentRail::Stars, 20, &payload, None)
        .await
        .unwrap();

    let effect = payments.reconcile_paid(intent.id, Some("txn-1")).await.unwrap();
    assert_eq!(effect, PaidEffect::Deposit { credited: 1000 });
    assert_eq!(balance_of(&pool, account).await, 1000);

    let err = payments.reconcile_paid(intent.id, Some("txn-1")).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(DomainError::AlreadyReconciled)
    ));
    assert_eq!(balance_of(&pool, account).await, 1000);

    let deposits = payments.deposits(account).await.unwrap();
    assert_eq!(deposits.len(), 1);
    assert_eq!(deposits[0].amount, 1000);
}

#[tokio::test]
async fn duplicate_push_confirmation_is_a_noop() {
    let Some(pool) = common::pool().await else { return };
    let payments = PaymentService::new(pool.clone());
    let account = common::create_account(&pool).await;

    let payload = PaymentPurpose::Deposit.to_payload_string(account, 2);
    payments
        .create_intent(account, PaymentPurpose::Deposit, PaymentRail::Stars, 40, &payload, None)
        .await
        .unwrap();

    let first = payments.reconcile_push(&payload, account, "charge-1").await.unwrap();
    assert_eq!(first, Some(PaidEffect::Deposit { credited: 2000 }));

    let second = payments.reconcile_push(&payload, account, "charge-1").await.unwrap();
    assert_eq!(second, None);

    assert_eq!(balance_of(&pool, account).await, 2000);
}

#[tokio::test]
async fn push_confirmation_from_the_wrong_payer_is_ignored() {
    let Some(pool) = common::pool().await else { return };
    let payments = PaymentService::new(pool.clone());
    let account = common::create_account(&pool).await;
    let intruder = common::create_account(&pool).await;

    let payload = PaymentPurpose::Deposit.to_payload_string(account, 3);
    payments
        .create_intent(account, PaymentPurpose::Deposit, PaymentRail::Stars, 20, &payload, None)
        .await
        .unwrap();

    let outcome = payments.reconcile_push(&payload, intruder, "charge-2").await.unwrap();
    assert_eq!(outcome, None);
    assert_eq!(balance_of(&pool, account).await, 0);
}

#[tokio::test]
async fn crypto_deposits_convert_one_to_one() {
    let Some(pool) = common::pool().await else { return };
    let payments = PaymentService::new(pool.clone());
    let account = common::create_account(&pool).await;

    let payload = PaymentPurpose::Deposit.to_payload_string(account, 4);
    let intent = payments
        .create_intent(
            account,
            PaymentPurpose::Deposit,
            PaymentRail::CryptoPay,
            1500,
            &payload,
            Some("90210"),
        )
        .await
        .unwrap();

    let effect = payments.reconcile_paid(intent.id, None).await.unwrap();
    assert_eq!(effect, PaidEffect::Deposit { credited: 1500 });
    assert_eq!(balance_of(&pool, account).await, 1500);
}

#[tokio::test]
async fn paid_subscription_sets_tier_and_expiry() {
    let Some(pool) = common::pool().await else { return };
    let payments = PaymentService::new(pool.clone());
    let account = common::create_account(&pool).await;

    let purpose = PaymentPurpose::Subscription(SubscriptionTier::VipNexus);
    let payload = purpose.to_payload_string(account, 5);
    let intent = payments
        .create_intent(account, purpose, PaymentRail::CryptoPay, 400, &payload, Some("777"))
        .await
        .unwrap();

    let effect = payments.reconcile_paid(intent.id, None).await.unwrap();
    assert_eq!(effect, PaidEffect::Subscription(SubscriptionTier::VipNexus));

    let (tier, end): (Option<String>, Option<chrono::DateTime<Utc>>) = sqlx::query_as(
        "SELECT subscription_tier, subscription_end FROM accounts WHERE id = $1",
    )
    .bind(account)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tier.as_deref(), Some("VIP Nexus"));
    let end = end.expect("subscription end set");
    let days = (end - Utc::now()).num_days();
    assert!((29..=30).contains(&days), "expiry ~30 days out, got {days}");

    // Card balance untouched by a subscription purchase.
    assert_eq!(balance_of(&pool, account).await, 0);
}
