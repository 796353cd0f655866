use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{OrderNumber, Points, UserId, Withdrawal},
};

/// Inserts a withdrawal record. Returns `None` if a withdrawal against this order number already exists.
///
/// This does not touch the balance. It is meant to be called from inside the debit transaction.
pub async fn record_withdrawal(
    user_id: UserId,
    order_number: &OrderNumber,
    amount: Points,
    conn: &mut SqliteConnection,
) -> Result<Option<Withdrawal>, SqliteDatabaseError> {
    let withdrawal = sqlx::query_as::<_, Withdrawal>(
        r#"
            INSERT INTO withdrawals (order_number, user_id, amount) VALUES ($1, $2, $3)
            ON CONFLICT(order_number) DO NOTHING
            RETURNING order_number, user_id, amount, processed_at;
        "#,
    )
    .bind(order_number.as_str())
    .bind(user_id.value())
    .bind(amount.value())
    .fetch_optional(conn)
    .await?;
    Ok(withdrawal)
}

pub async fn fetch_withdrawals_for_user(
    user_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Withdrawal>, SqliteDatabaseError> {
    let withdrawals = sqlx::query_as::<_, Withdrawal>(
        r#"
            SELECT order_number, user_id, amount, processed_at FROM withdrawals
            WHERE user_id = $1
            ORDER BY processed_at ASC, id ASC;
        "#,
    )
    .bind(user_id.value())
    .fetch_all(conn)
    .await?;
    Ok(withdrawals)
}
