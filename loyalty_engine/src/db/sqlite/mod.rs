pub mod db;
mod errors;

pub mod balances;
pub mod orders;
pub mod withdrawals;

use std::{str::FromStr, time::Duration};

pub use errors::SqliteDatabaseError;
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a connection pool, creating the database file if it does not exist yet.
///
/// The database runs in WAL mode so that the reconciler's writes do not block readers on the request path.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Applies the migrations bundled with this crate.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteDatabaseError> {
    sqlx::migrate!("./src/db/sqlite/migrations").run(pool).await?;
    info!("🗃️ Database migrations complete");
    Ok(())
}
