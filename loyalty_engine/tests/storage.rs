//! Integration tests for the SQLite storage gateway.
//!
//! These run against a real (throwaway) database so the transactional invariants are exercised for real:
//! settlement credits exactly once, terminal rows stay frozen, and withdrawals can never overdraw.
mod support;

use chrono::{Duration, Utc};
use loyalty_engine::{
    db_types::{NewOrder, OrderNumber, OrderStatus},
    traits::{BalanceApiError, BalanceManagement, OrderApiError, OrderManagement, UserApiError, UserManagement},
    SqliteDatabase,
};
use lpg_common::Points;
use support::prepare_test_db;

async fn new_user(db: &SqliteDatabase, login: &str) -> i64 {
    db.create_user(login, "$2b$12$not.a.real.hash").await.expect("Error creating user").id
}

#[tokio::test]
async fn logins_are_unique() {
    let db = prepare_test_db().await;
    let id = new_user(&db, "alice").await;
    assert!(id >= 1, "user ids start at 1");
    let err = db.create_user("alice", "another-hash").await.unwrap_err();
    assert!(matches!(err, UserApiError::UserAlreadyExists));
    let fetched = db.fetch_user_by_login("alice").await.unwrap().unwrap();
    assert_eq!(fetched.id, id);
    assert!(db.fetch_user_by_login("bob").await.unwrap().is_none());
}

#[tokio::test]
async fn order_ownership_is_resolved_and_immutable() {
    let db = prepare_test_db().await;
    let alice = new_user(&db, "alice").await;
    let number = OrderNumber::from("12345678903");
    assert_eq!(db.fetch_order_owner(&number).await.unwrap(), None);

    db.insert_order(NewOrder::new(number.clone(), OrderStatus::New, alice)).await.unwrap();
    assert_eq!(db.fetch_order_owner(&number).await.unwrap(), Some(alice));

    let err = db.insert_order(NewOrder::new(number.clone(), OrderStatus::New, alice)).await.unwrap_err();
    assert!(matches!(err, OrderApiError::DuplicateOrder(_)));
}

#[tokio::test]
async fn user_orders_come_back_newest_first() {
    let db = prepare_test_db().await;
    let alice = new_user(&db, "alice").await;
    let now = Utc::now();
    for (number, age_mins) in [("79927398713", 30), ("12345678903", 10), ("4561261212345467", 20)] {
        let order = NewOrder {
            number: OrderNumber::from(number),
            status: OrderStatus::New,
            uploaded_at: now - Duration::minutes(age_mins),
            user_id: alice,
        };
        db.insert_order(order).await.unwrap();
    }
    let orders = db.fetch_orders_for_user(alice).await.unwrap();
    let numbers: Vec<&str> = orders.iter().map(|o| o.number.as_str()).collect();
    assert_eq!(numbers, ["12345678903", "4561261212345467", "79927398713"]);
}

#[tokio::test]
async fn unsettled_scan_is_oldest_first_and_skips_terminal_rows() {
    let db = prepare_test_db().await;
    let alice = new_user(&db, "alice").await;
    let now = Utc::now();
    let rows = [
        ("79927398713", OrderStatus::Processing, 30),
        ("12345678903", OrderStatus::New, 10),
        ("4561261212345467", OrderStatus::Invalid, 20),
    ];
    for (number, status, age_mins) in rows {
        let order = NewOrder {
            number: OrderNumber::from(number),
            status,
            uploaded_at: now - Duration::minutes(age_mins),
            user_id: alice,
        };
        db.insert_order(order).await.unwrap();
    }
    let unsettled = db.fetch_unsettled_orders().await.unwrap();
    let numbers: Vec<&str> = unsettled.iter().map(|o| o.number.as_str()).collect();
    assert_eq!(numbers, ["79927398713", "12345678903"]);
}

#[tokio::test]
async fn settlement_credits_the_owner_exactly_once() {
    let db = prepare_test_db().await;
    let alice = new_user(&db, "alice").await;
    let number = OrderNumber::from("12345678903");
    db.insert_order(NewOrder::new(number.clone(), OrderStatus::Processing, alice)).await.unwrap();

    let settled = db
        .settle_order(&number, OrderStatus::Processed, Some(Points::from_points(500)))
        .await
        .unwrap()
        .expect("first settlement must apply");
    assert_eq!(settled.status, OrderStatus::Processed);
    assert_eq!(settled.accrual, Some(Points::from_points(500)));

    let balance = db.fetch_balance(alice).await.unwrap();
    assert_eq!(balance.current, Points::from_points(500));
    assert_eq!(balance.withdrawn, Points::ZERO);

    // A second pass over the same order must not double-credit.
    let repeat = db.settle_order(&number, OrderStatus::Processed, Some(Points::from_points(500))).await.unwrap();
    assert!(repeat.is_none());
    let balance = db.fetch_balance(alice).await.unwrap();
    assert_eq!(balance.current, Points::from_points(500));
}

#[tokio::test]
async fn terminal_orders_are_never_mutated_again() {
    let db = prepare_test_db().await;
    let alice = new_user(&db, "alice").await;
    let number = OrderNumber::from("79927398713");
    db.insert_order(NewOrder::new(number.clone(), OrderStatus::New, alice)).await.unwrap();

    db.settle_order(&number, OrderStatus::Invalid, None).await.unwrap().expect("settlement must apply");
    let after = db.settle_order(&number, OrderStatus::Processed, Some(Points::from_points(999))).await.unwrap();
    assert!(after.is_none());

    let orders = db.fetch_orders_for_user(alice).await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::Invalid);
    assert_eq!(orders[0].accrual, None);
    assert_eq!(db.fetch_balance(alice).await.unwrap().current, Points::ZERO);
}

#[tokio::test]
async fn balance_is_zero_for_unknown_users() {
    let db = prepare_test_db().await;
    let balance = db.fetch_balance(4242).await.unwrap();
    assert_eq!(balance.current, Points::ZERO);
    assert_eq!(balance.withdrawn, Points::ZERO);
}

#[tokio::test]
async fn withdrawal_moves_funds_and_keeps_the_ledger() {
    let db = prepare_test_db().await;
    let alice = new_user(&db, "alice").await;
    let number = OrderNumber::from("12345678903");
    db.insert_order(NewOrder::new(number.clone(), OrderStatus::New, alice)).await.unwrap();
    db.settle_order(&number, OrderStatus::Processed, Some(Points::from_points(500))).await.unwrap();

    db.withdraw(alice, "79927398713", Points::from_points(200), Utc::now()).await.unwrap();
    let balance = db.fetch_balance(alice).await.unwrap();
    assert_eq!(balance.current, Points::from_points(300));
    assert_eq!(balance.withdrawn, Points::from_points(200));

    let withdrawals = db.fetch_withdrawals(alice).await.unwrap();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].order_number, "79927398713");
    assert_eq!(withdrawals[0].sum, Points::from_points(200));
}

#[tokio::test]
async fn an_overdraw_attempt_changes_nothing() {
    let db = prepare_test_db().await;
    let alice = new_user(&db, "alice").await;
    let number = OrderNumber::from("12345678903");
    db.insert_order(NewOrder::new(number.clone(), OrderStatus::New, alice)).await.unwrap();
    db.settle_order(&number, OrderStatus::Processed, Some(Points::from_points(500))).await.unwrap();

    let err = db.withdraw(alice, "79927398713", Points::from_points(1000), Utc::now()).await.unwrap_err();
    assert!(matches!(err, BalanceApiError::InsufficientFunds));

    // The aborted transaction must leave no trace: no withdrawal row, no balance movement.
    let balance = db.fetch_balance(alice).await.unwrap();
    assert_eq!(balance.current, Points::from_points(500));
    assert_eq!(balance.withdrawn, Points::ZERO);
    assert!(db.fetch_withdrawals(alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn racing_withdrawals_cannot_both_succeed() {
    let db = prepare_test_db().await;
    let alice = new_user(&db, "alice").await;
    let number = OrderNumber::from("12345678903");
    db.insert_order(NewOrder::new(number.clone(), OrderStatus::New, alice)).await.unwrap();
    db.settle_order(&number, OrderStatus::Processed, Some(Points::from_points(500))).await.unwrap();

    // Two concurrent withdrawals of 300 against a balance of 500: exactly one may commit.
    let first = db.withdraw(alice, "79927398713", Points::from_points(300), Utc::now());
    let second = db.withdraw(alice, "4561261212345467", Points::from_points(300), Utc::now());
    let (first, second) = tokio::join!(first, second);
    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one withdrawal must win: {first:?} / {second:?}");

    let balance = db.fetch_balance(alice).await.unwrap();
    assert_eq!(balance.current, Points::from_points(200));
    assert_eq!(balance.withdrawn, Points::from_points(300));
    assert_eq!(db.fetch_withdrawals(alice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn withdrawals_come_back_newest_first() {
    let db = prepare_test_db().await;
    let alice = new_user(&db, "alice").await;
    let number = OrderNumber::from("12345678903");
    db.insert_order(NewOrder::new(number.clone(), OrderStatus::New, alice)).await.unwrap();
    db.settle_order(&number, OrderStatus::Processed, Some(Points::from_points(500))).await.unwrap();

    let now = Utc::now();
    db.withdraw(alice, "79927398713", Points::from_points(100), now - Duration::minutes(20)).await.unwrap();
    db.withdraw(alice, "4561261212345467", Points::from_points(100), now - Duration::minutes(5)).await.unwrap();
    db.withdraw(alice, "059", Points::from_points(100), now - Duration::minutes(10)).await.unwrap();

    let withdrawals = db.fetch_withdrawals(alice).await.unwrap();
    let numbers: Vec<&str> = withdrawals.iter().map(|w| w.order_number.as_str()).collect();
    assert_eq!(numbers, ["4561261212345467", "059", "79927398713"]);
}
