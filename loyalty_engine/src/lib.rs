//! Loyalty Engine
//!
//! The loyalty engine credits users with points for the orders they submit, and lets them spend those points. The
//! number of points an order is worth is decided by an external accrual service, which processes orders
//! asynchronously and rate-limits its clients.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`mod@db`]). The [`OrderLedger`] and [`BalanceStore`] traits define what a storage backend must
//!    provide. SQLite is the supported backend. The data types used in storage live in [`db_types`] and are public.
//! 2. The accrual service client ([`mod@accrual`]).
//! 3. The [`Reconciler`], a background engine that polls the accrual service for every unresolved order and commits
//!    the results, crediting each processed order exactly once.
//! 4. The public API for the request path: [`OrdersApi`] for submitting orders and [`WithdrawalsApi`] for spending
//!    points.
//!
//! Credits (from the reconciler) and debits (from withdrawals) for the same user are serialised by a shared
//! [`BalanceGuard`].
//!
//! The engine also emits events when an order changes status or a withdrawal is made. See [`events`] for how to hook
//! into them.
pub mod accrual;
mod api;
mod balance_guard;
mod db;
pub mod db_types;
pub mod events;
pub mod reconciler;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use accrual::{AccrualClient, AccrualError, AccrualOutcome, HttpAccrualClient};
pub use api::{
    errors::{OrdersApiError, WithdrawalsApiError},
    orders_api::{OrdersApi, SubmitOrderResult},
    withdrawals_api::WithdrawalsApi,
};
pub use balance_guard::{BalanceGuard, BalanceLock};
#[cfg(feature = "sqlite")]
pub use db::sqlite::{db::SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    BalanceStore,
    DebitResult,
    InsertOrderResult,
    LoyaltyDatabase,
    OrderLedger,
    ReconciliationBackend,
};
pub use reconciler::{EngineState, Reconciler, ReconcilerConfig, ReconcilerHandle};
