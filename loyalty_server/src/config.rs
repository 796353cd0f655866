//! Server configuration
//!
//! Everything is read from `LOYALTY_*` environment variables. Missing or invalid values are logged and replaced by
//! their defaults, so the server always starts with a usable configuration.
use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use loyalty_common::helpers::parse_boolean_flag;
use loyalty_engine::ReconcilerConfig;

const DEFAULT_LOYALTY_HOST: &str = "127.0.0.1";
const DEFAULT_LOYALTY_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/loyalty.db";
const DEFAULT_ACCRUAL_URL: &str = "http://127.0.0.1:8888";
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 5;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 10;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_QUEUE_SIZE: usize = 256;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Base URL of the accrual service, e.g. `http://accrual:8080`
    pub accrual_url: String,
    pub scan_interval: Duration,
    pub poll_timeout: Duration,
    /// Size of the worker pool. Always at least 1.
    pub workers: usize,
    /// Capacity of the job queue. Always at least 1.
    pub queue_size: usize,
    /// When non-zero, the balance guard hashes users onto this many locks instead of keeping one lock per user.
    pub balance_lock_shards: usize,
    pub run_migrations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LOYALTY_HOST.to_string(),
            port: DEFAULT_LOYALTY_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            accrual_url: DEFAULT_ACCRUAL_URL.to_string(),
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            poll_timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
            workers: DEFAULT_WORKERS,
            queue_size: DEFAULT_QUEUE_SIZE,
            balance_lock_shards: 0,
            run_migrations: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source. `lookup` returns `None` for unset variables.
    pub fn from_lookup<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let host = lookup("LOYALTY_HOST").unwrap_or_else(|| DEFAULT_LOYALTY_HOST.into());
        let port = parse_or_default(&lookup, "LOYALTY_PORT", DEFAULT_LOYALTY_PORT);
        let database_url = lookup("LOYALTY_DATABASE_URL").unwrap_or_else(|| {
            warn!("🪛️ LOYALTY_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.into()
        });
        let accrual_url = lookup("LOYALTY_ACCRUAL_URL").unwrap_or_else(|| {
            warn!("🪛️ LOYALTY_ACCRUAL_URL is not set. Using the default, {DEFAULT_ACCRUAL_URL}.");
            DEFAULT_ACCRUAL_URL.into()
        });
        let scan_interval = Duration::from_secs(at_least_one(
            "LOYALTY_SCAN_INTERVAL",
            parse_or_default(&lookup, "LOYALTY_SCAN_INTERVAL", DEFAULT_SCAN_INTERVAL_SECS),
        ));
        let poll_timeout = Duration::from_secs(at_least_one(
            "LOYALTY_POLL_TIMEOUT",
            parse_or_default(&lookup, "LOYALTY_POLL_TIMEOUT", DEFAULT_POLL_TIMEOUT_SECS),
        ));
        let workers = at_least_one("LOYALTY_WORKERS", parse_or_default(&lookup, "LOYALTY_WORKERS", DEFAULT_WORKERS));
        let queue_size =
            at_least_one("LOYALTY_QUEUE_SIZE", parse_or_default(&lookup, "LOYALTY_QUEUE_SIZE", DEFAULT_QUEUE_SIZE));
        let balance_lock_shards = parse_or_default(&lookup, "LOYALTY_BALANCE_LOCK_SHARDS", 0);
        let run_migrations = parse_boolean_flag(lookup("LOYALTY_RUN_MIGRATIONS"), true);
        Self {
            host,
            port,
            database_url,
            accrual_url,
            scan_interval,
            poll_timeout,
            workers,
            queue_size,
            balance_lock_shards,
            run_migrations,
        }
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            scan_interval: self.scan_interval,
            poll_timeout: self.poll_timeout,
            workers: self.workers,
            queue_size: self.queue_size,
        }
    }
}

fn parse_or_default<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(name) {
        None => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
    }
}

fn at_least_one<T>(name: &str, value: T) -> T
where T: From<u8> + PartialEq {
    if value == T::from(0) {
        warn!("🪛️ {name} cannot be zero. Using 1 instead.");
        T::from(1)
    } else {
        value
    }
}
