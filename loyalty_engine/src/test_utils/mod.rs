//! Helpers for testing the engine and the crates that build on it. Only available with the `test_utils` feature.
mod memory_ledger;
#[cfg(feature = "sqlite")]
pub mod prepare_env;
mod scripted_accrual;

pub use memory_ledger::{MemoryLedger, MemoryLedgerError};
pub use scripted_accrual::{ScriptedAccrualClient, Step};
