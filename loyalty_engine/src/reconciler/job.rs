use crate::db_types::{Order, OrderNumber, OrderStatusType, UserId};

/// A single unit of reconciliation work: poll the accrual service for one order and apply what it reports.
///
/// `status` is the order's status as it was when the job was created. It is the expected value for the
/// compare-and-swap when the result is written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub status: OrderStatusType,
    /// How many times this job has been handed back after being rate-limited.
    pub attempts: u32,
}

impl Job {
    pub fn new(order_number: OrderNumber, user_id: UserId, status: OrderStatusType) -> Self {
        Self { order_number, user_id, status, attempts: 0 }
    }

    pub fn next_attempt(self) -> Self {
        Self { attempts: self.attempts.saturating_add(1), ..self }
    }
}

impl From<Order> for Job {
    fn from(order: Order) -> Self {
        Self::new(order.number, order.user_id, order.status)
    }
}
