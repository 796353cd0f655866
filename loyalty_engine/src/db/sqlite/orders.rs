use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::InsertOrderResult},
    db_types::{NewOrder, Order, OrderNumber, OrderStatusType, Points, UserId},
};

const ORDER_COLUMNS: &str = "number, user_id, status, accrual, uploaded_at";

/// Inserts the order in the `NEW` state, unless the order number is already taken. In that case the stored order is
/// returned unchanged.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, SqliteDatabaseError> {
    let inserted = sqlx::query_as::<_, Order>(
        r#"
            INSERT INTO orders (number, user_id, status)
            VALUES ($1, $2, 'NEW')
            ON CONFLICT(number) DO NOTHING
            RETURNING number, user_id, status, accrual, uploaded_at;
        "#,
    )
    .bind(order.number.as_str())
    .bind(order.user_id.value())
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(order) => {
            debug!("🗃️ Order {} has been saved for {}", order.number, order.user_id);
            Ok(InsertOrderResult::Inserted(order))
        },
        None => {
            let existing = fetch_order_by_number(&order.number, conn)
                .await?
                .ok_or_else(|| SqliteDatabaseError::OrderNotFound(order.number.clone()))?;
            Ok(InsertOrderResult::AlreadyExists(existing))
        },
    }
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1"))
        .bind(number.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    user_id: Option<UserId>,
    statuses: Vec<OrderStatusType>,
}

impl OrderQueryFilter {
    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.statuses.is_empty()
    }
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `uploaded_at` in ascending order
pub async fn fetch_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders "));
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id.value());
    }
    if !query.statuses.is_empty() {
        where_clause.push("status IN (");
        for (i, status) in query.statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.as_str());
        }
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY uploaded_at ASC, rowid ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of fetch_orders: {}", orders.len());
    Ok(orders)
}

/// Compare-and-swap on the order status. The update only lands if the stored status is `expected`.
pub async fn update_order_status(
    number: &OrderNumber,
    expected: OrderStatusType,
    status: OrderStatusType,
    accrual: Points,
    conn: &mut SqliteConnection,
) -> Result<UserId, SqliteDatabaseError> {
    let owner = sqlx::query_scalar::<_, i64>(
        r#"
            UPDATE orders SET status = $1, accrual = $2
            WHERE number = $3 AND status = $4
            RETURNING user_id;
        "#,
    )
    .bind(status.as_str())
    .bind(accrual.value())
    .bind(number.as_str())
    .bind(expected.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    match owner {
        Some(user_id) => {
            trace!("🗃️ Order {number} moved from {expected} to {status}");
            Ok(UserId::from(user_id))
        },
        None => match fetch_order_by_number(number, conn).await? {
            Some(order) => Err(SqliteDatabaseError::StaleOrderStatus {
                number: number.clone(),
                expected,
                actual: order.status,
            }),
            None => Err(SqliteDatabaseError::OrderNotFound(number.clone())),
        },
    }
}
