use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use crate::db_types::OrderNumber;

/// Keeps track of the orders the reconciler is currently responsible for, whether queued, being polled or waiting
/// out a rate limit. The scan loop only creates a job for an order it can claim, so an order never has more than one
/// job in the system.
#[derive(Clone, Default)]
pub struct JobTracker {
    claimed: Arc<Mutex<HashSet<OrderNumber>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the order. Returns `false` if it was already claimed.
    pub fn claim(&self, number: &OrderNumber) -> bool {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner).insert(number.clone())
    }

    pub fn release(&self, number: &OrderNumber) {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner).remove(number);
    }

    pub fn is_claimed(&self, number: &OrderNumber) -> bool {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner).contains(number)
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wraps an existing claim so that it is released when the guard is dropped, including during a panic.
    pub fn guard(&self, number: OrderNumber) -> ClaimGuard {
        ClaimGuard { tracker: self.clone(), number: Some(number) }
    }
}

/// Releases a claim on drop, unless the claim has been handed over to someone else.
pub struct ClaimGuard {
    tracker: JobTracker,
    number: Option<OrderNumber>,
}

impl ClaimGuard {
    /// Keeps the claim alive after the guard is dropped. The new holder must release it.
    pub fn hand_over(mut self) {
        self.number = None;
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if let Some(number) = self.number.take() {
            self.tracker.release(&number);
        }
    }
}
