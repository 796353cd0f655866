use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{Balance, Points, UserId},
};

pub async fn fetch_balance(user_id: UserId, conn: &mut SqliteConnection) -> Result<Balance, SqliteDatabaseError> {
    let balance = sqlx::query_as::<_, Balance>("SELECT current, withdrawn FROM balances WHERE user_id = $1")
        .bind(user_id.value())
        .fetch_optional(conn)
        .await?;
    Ok(balance.unwrap_or_default())
}

/// Adds `amount` to the user's current balance, creating the balance record on first use.
pub async fn credit(
    user_id: UserId,
    amount: Points,
    conn: &mut SqliteConnection,
) -> Result<Balance, SqliteDatabaseError> {
    if amount.is_negative() {
        return Err(SqliteDatabaseError::InvalidAmount(amount));
    }
    let balance = sqlx::query_as::<_, Balance>(
        r#"
            INSERT INTO balances (user_id, current, withdrawn) VALUES ($1, $2, 0)
            ON CONFLICT(user_id) DO UPDATE SET current = current + excluded.current
            RETURNING current, withdrawn;
        "#,
    )
    .bind(user_id.value())
    .bind(amount.value())
    .fetch_one(conn)
    .await?;
    trace!("🗃️ {user_id} credited with {amount}. Current balance is {}", balance.current);
    Ok(balance)
}

/// Moves `amount` from the current balance to the withdrawn total, provided the current balance covers it.
///
/// Returns `None` without writing anything if the funds are insufficient.
pub async fn try_debit(
    user_id: UserId,
    amount: Points,
    conn: &mut SqliteConnection,
) -> Result<Option<Balance>, SqliteDatabaseError> {
    if !amount.is_positive() {
        return Err(SqliteDatabaseError::InvalidAmount(amount));
    }
    let balance = sqlx::query_as::<_, Balance>(
        r#"
            UPDATE balances SET current = current - $1, withdrawn = withdrawn + $1
            WHERE user_id = $2 AND current >= $1
            RETURNING current, withdrawn;
        "#,
    )
    .bind(amount.value())
    .bind(user_id.value())
    .fetch_optional(conn)
    .await?;
    if let Some(b) = &balance {
        trace!("🗃️ {user_id} debited by {amount}. Current balance is {}", b.current);
    }
    Ok(balance)
}
