use loyalty_engine::{
    db_types::*,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    BalanceStore,
    InsertOrderResult,
    OrderLedger,
    ReconciliationBackend,
    SqliteDatabase,
    SqliteDatabaseError,
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
async fn order_numbers_are_unique_across_users() {
    let (url, db) = setup().await;
    let result = db.insert_order(NewOrder::new(number("79927398713"), UserId::from(1))).await.unwrap();
    let InsertOrderResult::Inserted(order) = result else { panic!("Order should have been inserted") };
    assert_eq!(order.status, OrderStatusType::New);
    assert_eq!(order.accrual, Points::default());

    let result = db.insert_order(NewOrder::new(number("79927398713"), UserId::from(2))).await.unwrap();
    let InsertOrderResult::AlreadyExists(existing) = result else { panic!("Order should already exist") };
    assert_eq!(existing.user_id, UserId::from(1));
    assert!(db.fetch_orders_for_user(UserId::from(2)).await.unwrap().is_empty());
    tear_down(&url, db).await;
}

#[tokio::test]
async fn only_unresolved_orders_are_scanned() {
    let (url, db) = setup().await;
    for n in ["1", "2", "3", "4"] {
        db.insert_order(NewOrder::new(number(n), UserId::from(1))).await.unwrap();
    }
    db.update_order_status(&number("2"), OrderStatusType::New, OrderStatusType::Processing, Points::default())
        .await
        .unwrap();
    db.update_order_status(&number("3"), OrderStatusType::New, OrderStatusType::Invalid, Points::default())
        .await
        .unwrap();
    db.settle_processed_order(&number("4"), OrderStatusType::New, Points::from(1)).await.unwrap();

    let unresolved = db.fetch_unresolved_orders().await.unwrap();
    let numbers = unresolved.iter().map(|o| o.number.as_str()).collect::<Vec<_>>();
    assert_eq!(numbers, vec!["1", "2"]);
    assert_eq!(db.fetch_orders_for_user(UserId::from(1)).await.unwrap().len(), 4);
    tear_down(&url, db).await;
}

#[tokio::test]
async fn status_updates_are_compare_and_swap() {
    let (url, db) = setup().await;
    let n = number("79927398713");
    db.insert_order(NewOrder::new(n.clone(), UserId::from(7))).await.unwrap();

    let owner =
        db.update_order_status(&n, OrderStatusType::New, OrderStatusType::Processing, Points::default()).await.unwrap();
    assert_eq!(owner, UserId::from(7));

    // A second writer that still thinks the order is NEW loses
    let err = db
        .update_order_status(&n, OrderStatusType::New, OrderStatusType::Invalid, Points::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SqliteDatabaseError::StaleOrderStatus { actual: OrderStatusType::Processing, .. }));
    assert_eq!(db.fetch_order(&n).await.unwrap().unwrap().status, OrderStatusType::Processing);

    let err = db
        .update_order_status(&number("1"), OrderStatusType::New, OrderStatusType::Invalid, Points::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SqliteDatabaseError::OrderNotFound(_)));
    tear_down(&url, db).await;
}

#[tokio::test]
async fn settlement_credits_exactly_once() {
    let (url, db) = setup().await;
    let n = number("79927398713");
    db.insert_order(NewOrder::new(n.clone(), UserId::from(1))).await.unwrap();

    let owner = db.settle_processed_order(&n, OrderStatusType::New, Points::from(72998)).await.unwrap();
    assert_eq!(owner, UserId::from(1));
    // Replaying the same observation finds the order already terminal, and credits nothing
    let err = db.settle_processed_order(&n, OrderStatusType::New, Points::from(72998)).await.unwrap_err();
    assert!(matches!(err, SqliteDatabaseError::StaleOrderStatus { actual: OrderStatusType::Processed, .. }));

    let order = db.fetch_order(&n).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Processed);
    assert_eq!(order.accrual, Points::from(72998));
    assert_eq!(db.fetch_balance(UserId::from(1)).await.unwrap().current, Points::from(72998));
    tear_down(&url, db).await;
}

#[tokio::test]
async fn terminal_orders_are_never_overwritten() {
    let (url, db) = setup().await;
    let n = number("12345678903");
    db.insert_order(NewOrder::new(n.clone(), UserId::from(1))).await.unwrap();
    db.update_order_status(&n, OrderStatusType::New, OrderStatusType::Invalid, Points::default()).await.unwrap();

    for status in [OrderStatusType::New, OrderStatusType::Processing] {
        let result = db.update_order_status(&n, status, OrderStatusType::Processed, Points::from(5)).await;
        assert!(result.is_err());
    }
    assert!(db.settle_processed_order(&n, OrderStatusType::New, Points::from(5)).await.is_err());
    assert_eq!(db.fetch_order(&n).await.unwrap().unwrap().status, OrderStatusType::Invalid);
    assert_eq!(db.fetch_balance(UserId::from(1)).await.unwrap().current, Points::default());
    tear_down(&url, db).await;
}
