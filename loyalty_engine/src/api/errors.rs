use thiserror::Error;

use crate::db_types::{OrderNumber, Points, UserId};

#[derive(Debug, Clone, Error)]
pub enum OrdersApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {number} has already been submitted by another user")]
    OrderOwnedByAnotherUser { number: OrderNumber, owner: UserId },
}

#[derive(Debug, Clone, Error)]
pub enum WithdrawalsApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Withdrawal amounts must be positive, but got {0}")]
    InvalidAmount(Points),
    #[error("Insufficient funds. Requested {requested}, but only {available} is available")]
    InsufficientFunds { requested: Points, available: Points },
    #[error("A withdrawal against order {0} has already been made")]
    DuplicateWithdrawal(OrderNumber),
}
