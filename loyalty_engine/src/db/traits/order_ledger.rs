use std::future::Future;

use crate::{
    db::traits::{InsertOrderResult, LoyaltyDatabase},
    db_types::{NewOrder, Order, OrderNumber, OrderStatusType, Points, UserId},
};

/// The `OrderLedger` trait defines the behaviour for storing orders and moving them through their lifecycle.
pub trait OrderLedger: LoyaltyDatabase {
    /// Stores a new order in the `NEW` state. If the order number is already taken, nothing is written and the
    /// existing order is returned instead.
    fn insert_order(&self, order: NewOrder) -> impl Future<Output = Result<InsertOrderResult, Self::Error>> + Send;

    fn fetch_order(&self, number: &OrderNumber) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send;

    /// All orders submitted by the given user, oldest first.
    fn fetch_orders_for_user(&self, user_id: UserId) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send;

    /// All orders that are not yet in a terminal state, i.e. `NEW` or `PROCESSING`, oldest first.
    fn fetch_unresolved_orders(&self) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send;

    /// Sets the status and accrual of the order, provided its stored status is still `expected`. Returns the owner
    /// of the order.
    ///
    /// If the stored status differs from `expected` (which includes orders that have since reached a terminal
    /// state), or the order does not exist, nothing is written and an error is returned.
    fn update_order_status(
        &self,
        number: &OrderNumber,
        expected: OrderStatusType,
        status: OrderStatusType,
        accrual: Points,
    ) -> impl Future<Output = Result<UserId, Self::Error>> + Send;
}
