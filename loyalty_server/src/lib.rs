//! # Loyalty reconciliation server
//! This crate hosts the daemon that runs the order reconciliation engine. It is responsible for:
//! Loading the configuration and preparing the database.
//! Starting the reconciler and draining it gracefully on shutdown.
//! Serving a small operational HTTP interface.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/status`: The reconciler's state, e.g. `{"reconciler":"Running"}`.

pub mod cli;
pub mod config;
pub mod errors;
pub mod reconciler_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
