use std::fmt::Debug;

use log::*;

use crate::{
    accrual::AccrualClient,
    api::errors::OrdersApiError,
    db::traits::{InsertOrderResult, OrderLedger},
    db_types::{NewOrder, Order, OrderNumber, UserId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOrderResult {
    /// The order is new. It has been stored and handed to the accrual service.
    Accepted(Order),
    /// The same user submitted this order before. Nothing changed.
    AlreadySubmitted(Order),
}

/// `OrdersApi` is the entry point for users submitting orders and checking on them.
///
/// Submitting an order stores it as `NEW` and registers it with the accrual service. From then on the
/// [`crate::Reconciler`] takes care of it.
pub struct OrdersApi<B, C> {
    db: B,
    accrual: C,
}

impl<B, C> Debug for OrdersApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrdersApi")
    }
}

impl<B, C> OrdersApi<B, C> {
    pub fn new(db: B, accrual: C) -> Self {
        Self { db, accrual }
    }
}

impl<B, C> OrdersApi<B, C>
where
    B: OrderLedger,
    C: AccrualClient,
{
    /// Submits an order on behalf of `user_id`.
    ///
    /// Submitting the same order twice is harmless. Submitting an order that belongs to someone else is an error.
    /// A failure to register the order with the accrual service is logged, but does not fail the submission: the
    /// reconciler polls every unresolved order regardless.
    pub async fn submit_order(&self, user_id: UserId, number: OrderNumber) -> Result<SubmitOrderResult, OrdersApiError> {
        let order = NewOrder::new(number.clone(), user_id);
        let result = self.db.insert_order(order).await.map_err(|e| OrdersApiError::DatabaseError(e.to_string()))?;
        match result {
            InsertOrderResult::Inserted(order) => {
                info!("📦️ Order {number} submitted by {user_id}");
                if let Err(e) = self.accrual.register_order(&number).await {
                    warn!("📦️ Could not register order {number} with the accrual service: {e}");
                }
                Ok(SubmitOrderResult::Accepted(order))
            },
            InsertOrderResult::AlreadyExists(order) if order.user_id == user_id => {
                debug!("📦️ Order {number} was already submitted by {user_id}");
                Ok(SubmitOrderResult::AlreadySubmitted(order))
            },
            InsertOrderResult::AlreadyExists(order) => {
                warn!("📦️ {user_id} tried to submit order {number}, which belongs to {}", order.user_id);
                Err(OrdersApiError::OrderOwnedByAnotherUser { number, owner: order.user_id })
            },
        }
    }

    /// The user's orders, oldest first.
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrdersApiError> {
        self.db.fetch_orders_for_user(user_id).await.map_err(|e| OrdersApiError::DatabaseError(e.to_string()))
    }

    pub async fn order(&self, number: &OrderNumber) -> Result<Option<Order>, OrdersApiError> {
        self.db.fetch_order(number).await.map_err(|e| OrdersApiError::DatabaseError(e.to_string()))
    }
}
