use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
};

use chrono::Utc;
use thiserror::Error;

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

#[derive(Debug, Clone, Error)]
pub enum MemoryLedgerError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("Order {number} was expected to be {expected}, but it is {actual}")]
    StaleOrderStatus { number: OrderNumber, expected: OrderStatusType, actual: OrderStatusType },
    #[error("The ledger is unavailable")]
    Unavailable,
}

#[derive(Default)]
struct LedgerState {
    orders: Vec<Order>,
    balances: HashMap<UserId, Balance>,
    withdrawals: Vec<Withdrawal>,
}

impl LedgerState {
    fn order_mut(&mut self, number: &OrderNumber) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| &o.number == number)
    }

    fn compare_and_set(
        &mut self,
        number: &OrderNumber,
        expected: OrderStatusType,
        status: OrderStatusType,
        accrual: Points,
    ) -> Result<UserId, MemoryLedgerError> {
        let order = self.order_mut(number).ok_or_else(|| MemoryLedgerError::OrderNotFound(number.clone()))?;
        if order.status != expected {
            return Err(MemoryLedgerError::StaleOrderStatus {
                number: number.clone(),
                expected,
                actual: order.status,
            });
        }
        order.status = status;
        order.accrual = accrual;
        Ok(order.user_id)
    }
}

/// An in-memory storage backend for unit tests. It counts the writes made to it, and can be told to fail scans.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    failing_scans: Arc<AtomicUsize>,
    scans: Arc<AtomicUsize>,
    status_updates: Arc<AtomicUsize>,
    credits: Arc<AtomicUsize>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an order in the given state, as if it had been submitted earlier.
    pub fn seed_order(&self, number: &str, user_id: i64, status: OrderStatusType) {
        let order = Order {
            number: number.parse().expect("invalid order number"),
            user_id: UserId::from(user_id),
            status,
            accrual: Points::default(),
            uploaded_at: Utc::now(),
        };
        self.state.lock().unwrap().orders.push(order);
    }

    pub fn seed_balance(&self, user_id: i64, current: Points) {
        let mut state = self.state.lock().unwrap();
        state.balances.entry(UserId::from(user_id)).or_default().current = current;
    }

    /// The next `n` calls to `fetch_unresolved_orders` fail.
    pub fn fail_next_scans(&self, n: usize) {
        self.failing_scans.store(n, Ordering::SeqCst);
    }

    pub fn order(&self, number: &str) -> Order {
        let number = number.parse::<OrderNumber>().expect("invalid order number");
        let state = self.state.lock().unwrap();
        state.orders.iter().find(|o| o.number == number).cloned().expect("order not found")
    }

    pub fn balance(&self, user_id: i64) -> Balance {
        self.state.lock().unwrap().balances.get(&UserId::from(user_id)).copied().unwrap_or_default()
    }

    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Number of committed status changes, including settlements.
    pub fn status_update_count(&self) -> usize {
        self.status_updates.load(Ordering::SeqCst)
    }

    pub fn credit_count(&self) -> usize {
        self.credits.load(Ordering::SeqCst)
    }
}

impl LoyaltyDatabase for MemoryLedger {
    type Error = MemoryLedgerError;

    fn url(&self) -> &str {
        "memory://"
    }
}

impl OrderLedger for MemoryLedger {
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.orders.iter().find(|o| o.number == order.number) {
            return Ok(InsertOrderResult::AlreadyExists(existing.clone()));
        }
        let order = Order {
            number: order.number,
            user_id: order.user_id,
            status: OrderStatusType::New,
            accrual: Points::default(),
            uploaded_at: Utc::now(),
        };
        state.orders.push(order.clone());
        Ok(InsertOrderResult::Inserted(order))
    }

    async fn fetch_order(&self, number: &OrderNumber) -> Result<Option<Order>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.orders.iter().find(|o| &o.number == number).cloned())
    }

    async fn fetch_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.orders.iter().filter(|o| o.user_id == user_id).cloned().collect())
    }

    async fn fetch_unresolved_orders(&self) -> Result<Vec<Order>, Self::Error> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_scans.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_scans.store(failing - 1, Ordering::SeqCst);
            return Err(MemoryLedgerError::Unavailable);
        }
        let state = self.state.lock().unwrap();
        Ok(state.orders.iter().filter(|o| !o.status.is_terminal()).cloned().collect())
    }

    async fn update_order_status(
        &self,
        number: &OrderNumber,
        expected: OrderStatusType,
        status: OrderStatusType,
        accrual: Points,
    ) -> Result<UserId, Self::Error> {
        let owner = self.state.lock().unwrap().compare_and_set(number, expected, status, accrual)?;
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        Ok(owner)
    }
}

impl BalanceStore for MemoryLedger {
    async fn fetch_balance(&self, user_id: UserId) -> Result<Balance, Self::Error> {
        Ok(self.state.lock().unwrap().balances.get(&user_id).copied().unwrap_or_default())
    }

    async fn credit(&self, user_id: UserId, amount: Points) -> Result<Balance, Self::Error> {
        let mut state = self.state.lock().unwrap();
        let balance = state.balances.entry(user_id).or_default();
        balance.current += amount;
        self.credits.fetch_add(1, Ordering::SeqCst);
        Ok(*balance)
    }

    async fn debit(
        &self,
        user_id: UserId,
        order_number: &OrderNumber,
        amount: Points,
    ) -> Result<DebitResult, Self::Error> {
        let mut state = self.state.lock().unwrap();
        if state.withdrawals.iter().any(|w| &w.order_number == order_number) {
            return Ok(DebitResult::DuplicateWithdrawal);
        }
        let balance = state.balances.get(&user_id).copied().unwrap_or_default();
        if balance.current < amount {
            return Ok(DebitResult::InsufficientFunds(balance));
        }
        let entry = state.balances.entry(user_id).or_default();
        entry.current -= amount;
        entry.withdrawn += amount;
        let withdrawal =
            Withdrawal { order_number: order_number.clone(), user_id, amount, processed_at: Utc::now() };
        state.withdrawals.push(withdrawal.clone());
        Ok(DebitResult::Debited(withdrawal))
    }

    async fn fetch_withdrawals_for_user(&self, user_id: UserId) -> Result<Vec<Withdrawal>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.withdrawals.iter().filter(|w| w.user_id == user_id).cloned().collect())
    }
}

impl ReconciliationBackend for MemoryLedger {
    async fn settle_processed_order(
        &self,
        number: &OrderNumber,
        expected: OrderStatusType,
        accrual: Points,
    ) -> Result<UserId, Self::Error> {
        let mut state = self.state.lock().unwrap();
        let owner = state.compare_and_set(number, expected, OrderStatusType::Processed, accrual)?;
        state.balances.entry(owner).or_default().current += accrual;
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        self.credits.fetch_add(1, Ordering::SeqCst);
        Ok(owner)
    }
}
