pub mod errors;
pub mod orders_api;
pub mod withdrawals_api;
