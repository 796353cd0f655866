//! #  Storage contracts.
//!
//! This module defines the interface contracts that a storage *backend* must satisfy to support the loyalty engine.
//!
//! ## Orders
//! Orders are keyed by their order number. They are created in the `NEW` state when a user submits them, and are then
//! moved forward by the reconciler as the accrual service reports progress. The [`OrderLedger`] trait covers these
//! operations. Its central operation, [`OrderLedger::update_order_status`], is a compare-and-swap: the update only
//! lands if the stored status still matches the status the caller last observed.
//!
//! ## Balances
//! Every user has a current (spendable) balance and a running total of withdrawn points. The [`BalanceStore`] trait
//! credits and debits these balances. Callers are expected to hold the user's [`crate::BalanceGuard`] while doing so.
//!
//! ## Settlement
//! [`ReconciliationBackend`] ties the two together for the one operation that touches both: marking an order as
//! `PROCESSED` and crediting its reward in a single atomic step.
mod balance_store;
mod data_objects;
mod order_ledger;

use std::future::Future;

pub use balance_store::BalanceStore;
pub use data_objects::{DebitResult, InsertOrderResult};
pub use order_ledger::OrderLedger;

use crate::db_types::{OrderNumber, OrderStatusType, Points, UserId};

/// The base trait for all storage backends. It fixes the error type shared by the order ledger and the balance store.
pub trait LoyaltyDatabase: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The URL of the database
    fn url(&self) -> &str;
}

/// Backends that can be driven by the [`crate::Reconciler`].
pub trait ReconciliationBackend: OrderLedger + BalanceStore {
    /// Atomically moves the order from `expected` to `PROCESSED`, records the reward, and credits the reward to the
    /// order's owner. Either both writes are committed or neither is.
    ///
    /// Fails without side effects if the stored status is not `expected`. Returns the owner of the order.
    fn settle_processed_order(
        &self,
        number: &OrderNumber,
        expected: OrderStatusType,
        accrual: Points,
    ) -> impl Future<Output = Result<UserId, Self::Error>> + Send;
}
