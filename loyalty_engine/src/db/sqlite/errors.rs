use thiserror::Error;

use crate::db_types::{OrderNumber, OrderStatusType, Points};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("Order {number} was expected to be {expected}, but it is {actual}")]
    StaleOrderStatus { number: OrderNumber, expected: OrderStatusType, actual: OrderStatusType },
    #[error("Amounts must be positive, but got {0}")]
    InvalidAmount(Points),
}
