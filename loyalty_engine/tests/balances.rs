use std::sync::Arc;

use loyalty_engine::{
    db_types::*,
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    BalanceGuard,
    BalanceStore,
    DebitResult,
    OrderLedger,
    ReconciliationBackend,
    SqliteDatabase,
    WithdrawalsApi,
    WithdrawalsApiError,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

async fn setup() -> (String, SqliteDatabase) {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    (url, db)
}

async fn tear_down(url: &str, db: SqliteDatabase) {
    db.pool().close().await;
    Sqlite::drop_database(url).await.unwrap();
}

fn number(n: &str) -> OrderNumber {
    n.parse().unwrap()
}

#[tokio::test]
async fn unknown_users_have_a_zero_balance() {
    let (url, db) = setup().await;
    let balance = db.fetch_balance(UserId::from(404)).await.unwrap();
    assert_eq!(balance, Balance::default());
    tear_down(&url, db).await;
}

#[tokio::test]
async fn debit_never_takes_the_balance_below_zero() {
    let (url, db) = setup().await;
    let alice = UserId::from(1);
    db.credit(alice, Points::from_points(100)).await.unwrap();

    let result = db.debit(alice, &number("2377225624"), Points::from(10001)).await.unwrap();
    assert_eq!(result, DebitResult::InsufficientFunds(Balance {
        current: Points::from_points(100),
        withdrawn: Points::default()
    }));
    assert!(db.fetch_withdrawals_for_user(alice).await.unwrap().is_empty());

    let result = db.debit(alice, &number("2377225624"), Points::from_points(100)).await.unwrap();
    assert!(matches!(result, DebitResult::Debited(ref w) if w.amount == Points::from_points(100)));
    let balance = db.fetch_balance(alice).await.unwrap();
    assert_eq!(balance.current, Points::default());
    assert_eq!(balance.withdrawn, Points::from_points(100));

    // Users without a balance record cannot withdraw either
    let result = db.debit(UserId::from(2), &number("1"), Points::from(1)).await.unwrap();
    assert!(matches!(result, DebitResult::InsufficientFunds(_)));
    tear_down(&url, db).await;
}

#[tokio::test]
async fn duplicate_withdrawals_are_rolled_back() {
    let (url, db) = setup().await;
    let alice = UserId::from(1);
    db.credit(alice, Points::from_points(100)).await.unwrap();
    db.debit(alice, &number("42"), Points::from_points(10)).await.unwrap();

    let result = db.debit(alice, &number("42"), Points::from_points(10)).await.unwrap();
    assert_eq!(result, DebitResult::DuplicateWithdrawal);
    let balance = db.fetch_balance(alice).await.unwrap();
    assert_eq!(balance.current, Points::from_points(90));
    assert_eq!(balance.withdrawn, Points::from_points(10));
    assert_eq!(db.fetch_withdrawals_for_user(alice).await.unwrap().len(), 1);
    tear_down(&url, db).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_credit_and_withdrawal_lose_no_updates() {
    let (url, db) = setup().await;
    let alice = UserId::from(1);
    db.credit(alice, Points::from_points(300)).await.unwrap();
    db.insert_order(NewOrder::new(number("79927398713"), alice)).await.unwrap();

    let guard = BalanceGuard::new();
    let api = Arc::new(WithdrawalsApi::new(db.clone(), guard.clone(), EventProducers::default()));
    let settle = {
        let db = db.clone();
        let guard = guard.clone();
        tokio::spawn(async move {
            let _lock = guard.acquire(alice).await;
            db.settle_processed_order(&number("79927398713"), OrderStatusType::New, Points::from_points(500)).await
        })
    };
    let withdraw = {
        let api = Arc::clone(&api);
        tokio::spawn(async move { api.withdraw(alice, number("2377225624"), Points::from_points(300)).await })
    };
    settle.await.unwrap().unwrap();
    withdraw.await.unwrap().unwrap();

    let balance = db.fetch_balance(alice).await.unwrap();
    assert_eq!(balance.current, Points::from_points(500));
    assert_eq!(balance.withdrawn, Points::from_points(300));
    tear_down(&url, db).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_withdrawals_cannot_overdraw() {
    let (url, db) = setup().await;
    let alice = UserId::from(1);
    db.credit(alice, Points::from_points(500)).await.unwrap();
    let api = Arc::new(WithdrawalsApi::new(db.clone(), BalanceGuard::new(), EventProducers::default()));

    let tasks = (0..10)
        .map(|i| {
            let api = Arc::clone(&api);
            tokio::spawn(async move { api.withdraw(alice, number(&format!("{}", 100 + i)), Points::from_points(100)).await })
        })
        .collect::<Vec<_>>();
    let mut succeeded = 0;
    let mut refused = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(WithdrawalsApiError::InsufficientFunds { .. }) => refused += 1,
            Err(e) => panic!("Unexpected error: {e}"),
        }
    }
    assert_eq!((succeeded, refused), (5, 5));
    let balance = db.fetch_balance(alice).await.unwrap();
    assert_eq!(balance.current, Points::default());
    assert_eq!(balance.withdrawn, Points::from_points(500));
    assert_eq!(db.fetch_withdrawals_for_user(alice).await.unwrap().len(), 5);
    tear_down(&url, db).await;
}
