use std::time::Duration;

use cucumber::{given, then, when};
use loyalty_engine::{
    db_types::{OrderNumber, OrderStatusType, Points, UserId},
    test_utils::Step,
    BalanceStore,
    OrderLedger,
    WithdrawalsApiError,
};

use crate::cucumber::LoyaltyWorld;

fn points(value: f64) -> Points {
    Points::try_from_f64(value).expect("Not a valid points amount")
}

fn order_number(number: &str) -> OrderNumber {
    number.parse().expect("Not a valid order number")
}

fn status(status: &str) -> OrderStatusType {
    status.parse().expect("Not a valid order status")
}

#[given(expr = "user {int} has a balance of {float} points")]
async fn seed_balance(world: &mut LoyaltyWorld, user: i64, amount: f64) {
    let db = &world.system().db;
    db.credit(UserId::from(user), points(amount)).await.expect("Error crediting balance");
}

#[when(expr = "user {int} submits order {word}")]
async fn submit_order(world: &mut LoyaltyWorld, user: i64, number: String) {
    let system = world.system();
    if let Err(e) = system.orders.submit_order(UserId::from(user), order_number(&number)).await {
        system.last_error = Some(e.to_string());
    }
}

#[given(expr = "the accrual service reports order {word} as {word}")]
#[when(expr = "the accrual service reports order {word} as {word}")]
async fn accrual_reports_status(world: &mut LoyaltyWorld, number: String, new_status: String) {
    world.system().accrual.script(&number, vec![Step::status(status(&new_status))]);
}

#[given(expr = "the accrual service reports order {word} as PROCESSED with {float} points")]
#[when(expr = "the accrual service reports order {word} as PROCESSED with {float} points")]
async fn accrual_reports_processed(world: &mut LoyaltyWorld, number: String, amount: f64) {
    world.system().accrual.script(&number, vec![Step::processed(points(amount))]);
}

#[given(expr = "the accrual service rate-limits order {word} for {int}s and then reports {float} points")]
async fn accrual_rate_limits(world: &mut LoyaltyWorld, number: String, secs: u64, amount: f64) {
    world.system().accrual.script(&number, vec![Step::rate_limited(secs), Step::processed(points(amount))]);
}

#[when(expr = "user {int} withdraws {float} points against order {word}")]
async fn withdraw(world: &mut LoyaltyWorld, user: i64, amount: f64, number: String) {
    let system = world.system();
    system.last_error = None;
    if let Err(e) = system.withdrawals.withdraw(UserId::from(user), order_number(&number), points(amount)).await {
        let message = match e {
            WithdrawalsApiError::InsufficientFunds { .. } => "insufficient funds".to_string(),
            e => e.to_string(),
        };
        system.last_error = Some(message);
    }
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut LoyaltyWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[when("the reconciler is stopped")]
async fn stop_reconciler(world: &mut LoyaltyWorld) {
    world.system().stop_reconciler().await;
}

#[then(expr = "order {word} is {word}")]
async fn check_order_status(world: &mut LoyaltyWorld, number: String, expected: String) {
    let db = &world.system().db;
    let order = db.fetch_order(&order_number(&number)).await.expect("Error fetching order").expect("No such order");
    assert_eq!(order.status, status(&expected), "Order {number} has the wrong status");
}

#[then(expr = "order {word} has been polled {int} time(s)")]
async fn check_poll_count(world: &mut LoyaltyWorld, number: String, count: usize) {
    let polls = world.system().accrual.polls_for(&number);
    assert_eq!(polls.len(), count, "Order {number} was polled {} times", polls.len());
}

#[then(expr = "order {word} was not polled again for at least {int}s")]
async fn check_poll_gap(world: &mut LoyaltyWorld, number: String, secs: u64) {
    let polls = world.system().accrual.polls_for(&number);
    assert!(polls.len() >= 2, "Order {number} was only polled {} times", polls.len());
    assert!(polls[1] - polls[0] >= Duration::from_secs(secs), "Retry came after {:?}", polls[1] - polls[0]);
}

#[then(expr = "user {int} has a balance of {float} points")]
async fn check_balance(world: &mut LoyaltyWorld, user: i64, amount: f64) {
    let db = &world.system().db;
    let balance = db.fetch_balance(UserId::from(user)).await.expect("Error fetching balance");
    assert_eq!(balance.current, points(amount), "Balance is incorrect");
}

#[then(expr = "user {int} has withdrawn {float} points")]
async fn check_withdrawn(world: &mut LoyaltyWorld, user: i64, amount: f64) {
    let db = &world.system().db;
    let balance = db.fetch_balance(UserId::from(user)).await.expect("Error fetching balance");
    assert_eq!(balance.withdrawn, points(amount), "Withdrawn total is incorrect");
}

#[then(expr = "the last request fails with {string}")]
async fn check_last_error(world: &mut LoyaltyWorld, expected: String) {
    let error = world.system().last_error.clone().expect("The last request succeeded");
    assert!(error.contains(&expected), "Unexpected error: {error}");
}

#[then("the last request succeeds")]
async fn check_last_success(world: &mut LoyaltyWorld) {
    let error = world.system().last_error.clone();
    assert!(error.is_none(), "Unexpected error: {error:?}");
}
