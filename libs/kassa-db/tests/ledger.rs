mod common;

use kassa_core::DomainError;
use kassa_db::StoreError;
use kassa_db::models::ledger::LedgerEventKind;
use kassa_db::services::LedgerService;

async fn balance_of(pool: &sqlx::PgPool, id: i64) -> i64 {
    sqlx::query_scalar("SELECT card_balance FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("fetch balance")
}

#[tokio::test]
async fn cached_balance_always_equals_event_replay() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let a = common::create_account(&pool).await;
    let b = common::create_account(&pool).await;

    ledger.credit(a, 1000, LedgerEventKind::Deposit).await.unwrap();
    ledger.debit(a, 300, LedgerEventKind::Withdraw).await.unwrap();
    ledger.transfer(a, b, 200).await.unwrap();

    for id in [a, b] {
        let cached = balance_of(&pool, id).await;
        let replayed = ledger.event_sum(id).await.unwrap();
        assert_eq!(cached, replayed, "account {id} diverged from its event log");
    }
    assert_eq!(balance_of(&pool, a).await, 500);
    assert_eq!(balance_of(&pool, b).await, 200);
}

#[tokio::test]
async fn debit_fails_without_touching_anything() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let a = common::create_account(&pool).await;

    ledger.credit(a, 100, LedgerEventKind::Deposit).await.unwrap();
    let err = ledger.debit(a, 200, LedgerEventKind::Withdraw).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(DomainError::InsufficientFunds)
    ));
    assert_eq!(balance_of(&pool, a).await, 100);
    assert_eq!(ledger.event_sum(a).await.unwrap(), 100);
}

#[tokio::test]
async fn self_transfer_is_rejected_regardless_of_balance() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let a = common::create_account(&pool).await;
    ledger.credit(a, 500, LedgerEventKind::Deposit).await.unwrap();

    let err = ledger.transfer(a, a, 100).await.unwrap_err();
    assert!(matches!(err, StoreError::Domain(DomainError::SelfTransfer)));
    assert_eq!(balance_of(&pool, a).await, 500);
}

#[tokio::test]
async fn transfer_to_unknown_account_fails_atomically() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let a = common::create_account(&pool).await;
    ledger.credit(a, 500, LedgerEventKind::Deposit).await.unwrap();

    let err = ledger.transfer(a, common::fresh_id(), 100).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(DomainError::AccountNotFound)
    ));
    assert_eq!(balance_of(&pool, a).await, 500);
}

#[tokio::test]
async fn concurrent_transfers_of_the_whole_balance_pick_one_winner() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let a = common::create_account(&pool).await;
    let b = common::create_account(&pool).await;
    let c = common::create_account(&pool).await;

    ledger.credit(a, 100, LedgerEventKind::Deposit).await.unwrap();

    let (to_b, to_c) = tokio::join!(ledger.transfer(a, b, 100), ledger.transfer(a, c, 100));
    let successes = [&to_b, &to_c].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one transfer may win");
    for result in [to_b, to_c] {
        if let Err(e) = result {
            assert!(matches!(
                e,
                StoreError::Domain(DomainError::InsufficientFunds)
            ));
        }
    }

    assert_eq!(balance_of(&pool, a).await, 0);
    assert_eq!(balance_of(&pool, b).await + balance_of(&pool, c).await, 100);
    assert_eq!(ledger.event_sum(a).await.unwrap(), 0);
}

#[tokio::test]
async fn history_is_newest_first() {
    let Some(pool) = common::pool().await else { return };
    let ledger = LedgerService::new(pool.clone());
    let a = common::create_account(&pool).await;

    ledger.credit(a, 1000, LedgerEventKind::Deposit).await.unwrap();
    ledger.debit(a, 400, LedgerEventKind::Withdraw).await.unwrap();

    let events = ledger.history(a).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, "withdraw");
    assert_eq!(events[0].amount, -400);
    assert_eq!(events[1].kind, "deposit");
    assert_eq!(events[1].amount, 1000);
}
