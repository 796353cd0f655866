use serde::{Deserialize, Serialize};

use crate::db_types::{OrderNumber, OrderStatusType, Points, UserId, Withdrawal};

/// Emitted by the reconciler after an order's status change has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdatedEvent {
    pub number: OrderNumber,
    pub user_id: UserId,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
    /// The amount credited to the user's balance as part of this change. Zero unless the order was processed.
    pub credited: Points,
}

impl OrderUpdatedEvent {
    pub fn new(
        number: OrderNumber,
        user_id: UserId,
        old_status: OrderStatusType,
        new_status: OrderStatusType,
        credited: Points,
    ) -> Self {
        Self { number, user_id, old_status, new_status, credited }
    }
}

/// Emitted after a withdrawal has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub withdrawal: Withdrawal,
}

impl WithdrawalEvent {
    pub fn new(withdrawal: Withdrawal) -> Self {
        Self { withdrawal }
    }
}
