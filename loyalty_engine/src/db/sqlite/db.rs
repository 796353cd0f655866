use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::{balances, new_pool, orders, orders::OrderQueryFilter, run_migrations, withdrawals, SqliteDatabaseError};
use crate::{
    db::traits::{
        BalanceStore,
        DebitResult,
        InsertOrderResult,
        LoyaltyDatabase,
        OrderLedger,
        ReconciliationBackend,
    },
    db_types::{Balance, NewOrder, Order, OrderNumber, OrderStatusType, Points, UserId, Withdrawal},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        run_migrations(&self.pool).await
    }
}

impl LoyaltyDatabase for SqliteDatabase {
    type Error = SqliteDatabaseError;

    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl OrderLedger for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::idempotent_insert(order, &mut conn).await
    }

    async fn fetch_order(&self, number: &OrderNumber) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_number(number, &mut conn).await
    }

    async fn fetch_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders(OrderQueryFilter::default().with_user_id(user_id), &mut conn).await
    }

    async fn fetch_unresolved_orders(&self) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let query =
            OrderQueryFilter::default().with_status(OrderStatusType::New).with_status(OrderStatusType::Processing);
        orders::fetch_orders(query, &mut conn).await
    }

    async fn update_order_status(
        &self,
        number: &OrderNumber,
        expected: OrderStatusType,
        status: OrderStatusType,
        accrual: Points,
    ) -> Result<UserId, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(number, expected, status, accrual, &mut conn).await
    }
}

impl BalanceStore for SqliteDatabase {
    async fn fetch_balance(&self, user_id: UserId) -> Result<Balance, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        balances::fetch_balance(user_id, &mut conn).await
    }

    async fn credit(&self, user_id: UserId, amount: Points) -> Result<Balance, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        balances::credit(user_id, amount, &mut conn).await
    }

    /// Takes a withdrawal request, and in a single atomic transaction,
    /// * debits the current balance and adds the amount to the withdrawn total, provided the balance covers it,
    /// * records the withdrawal against the order number.
    ///
    /// If either step cannot be performed, the transaction is rolled back.
    async fn debit(
        &self,
        user_id: UserId,
        order_number: &OrderNumber,
        amount: Points,
    ) -> Result<DebitResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        if balances::try_debit(user_id, amount, &mut tx).await?.is_none() {
            let balance = balances::fetch_balance(user_id, &mut tx).await?;
            tx.rollback().await?;
            debug!("🗃️ {user_id} cannot withdraw {amount}. Current balance is {}", balance.current);
            return Ok(DebitResult::InsufficientFunds(balance));
        }
        match withdrawals::record_withdrawal(user_id, order_number, amount, &mut tx).await? {
            Some(withdrawal) => {
                tx.commit().await?;
                debug!("🗃️ {user_id} withdrew {amount} against order {order_number}");
                Ok(DebitResult::Debited(withdrawal))
            },
            None => {
                tx.rollback().await?;
                debug!("🗃️ A withdrawal against order {order_number} already exists. Debit rolled back");
                Ok(DebitResult::DuplicateWithdrawal)
            },
        }
    }

    async fn fetch_withdrawals_for_user(&self, user_id: UserId) -> Result<Vec<Withdrawal>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        withdrawals::fetch_withdrawals_for_user(user_id, &mut conn).await
    }
}

impl ReconciliationBackend for SqliteDatabase {
    async fn settle_processed_order(
        &self,
        number: &OrderNumber,
        expected: OrderStatusType,
        accrual: Points,
    ) -> Result<UserId, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let owner = orders::update_order_status(number, expected, OrderStatusType::Processed, accrual, &mut tx).await?;
        let balance = balances::credit(owner, accrual, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {number} settled. {owner} credited with {accrual}, balance is now {}", balance.current);
        Ok(owner)
    }
}
