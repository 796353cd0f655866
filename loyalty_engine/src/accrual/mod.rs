//! # Accrual service client
//!
//! The accrual service is the external system that decides how many points an order is worth. It is slow (orders are
//! processed asynchronously) and rate-limited, so the engine never calls it on the request path beyond a best-effort
//! registration. Instead, the [`crate::Reconciler`] polls it for every unresolved order.
//!
//! Each poll is classified into exactly one [`AccrualOutcome`]. The client does not retry on its own; retries and
//! backoff are the reconciler's business.
mod errors;
mod http_client;
mod response;

use std::{future::Future, time::Duration};

pub use errors::AccrualError;
pub use http_client::HttpAccrualClient;
pub use response::{classify_response, AccrualResponse, AccrualStatus};

use crate::db_types::{OrderNumber, OrderStatusType, Points};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualOutcome {
    /// The accrual service knows the order and reported its current status. `accrual` is only present for
    /// processed orders.
    Resolved { status: OrderStatusType, accrual: Option<Points> },
    /// The service asked us to back off for the given duration before asking again.
    RateLimited { retry_after: Duration },
    /// Anything else. The order will be picked up again on a later scan.
    Failed(AccrualError),
}

pub trait AccrualClient: Clone + Send + Sync + 'static {
    /// Asks the accrual service for the status of a single order. Exactly one request is made.
    fn poll(&self, number: &OrderNumber) -> impl Future<Output = AccrualOutcome> + Send;

    /// Tells the accrual service about a newly submitted order. Registering an order that the service already knows
    /// about is not an error.
    fn register_order(&self, number: &OrderNumber) -> impl Future<Output = Result<(), AccrualError>> + Send;
}
