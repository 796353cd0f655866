use std::fmt::Debug;

use cucumber::World;
use log::*;
use loyalty_engine::{
    events::EventProducers,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        ScriptedAccrualClient,
    },
    BalanceGuard,
    OrdersApi,
    ReconcilerHandle,
    SqliteDatabase,
    WithdrawalsApi,
};
use tokio::sync::watch;

#[derive(Default, Debug, World)]
pub struct LoyaltyWorld {
    pub system: Option<LoyaltySystem>,
}

pub struct LoyaltySystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub accrual: ScriptedAccrualClient,
    pub guard: BalanceGuard,
    pub orders: OrdersApi<SqliteDatabase, ScriptedAccrualClient>,
    pub withdrawals: WithdrawalsApi<SqliteDatabase>,
    pub reconciler: Option<(watch::Sender<bool>, ReconcilerHandle)>,
    pub last_error: Option<String>,
}

impl Debug for LoyaltySystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoyaltySystem ({})", self.db_path)
    }
}

impl LoyaltyWorld {
    pub fn system(&mut self) -> &mut LoyaltySystem {
        self.system.as_mut().expect("Loyalty system not initialised")
    }
}

impl LoyaltySystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        debug!("Created database: {url}");
        let accrual = ScriptedAccrualClient::new();
        let guard = BalanceGuard::new();
        let orders = OrdersApi::new(db.clone(), accrual.clone());
        let withdrawals = WithdrawalsApi::new(db.clone(), guard.clone(), EventProducers::default());
        Self { db_path: url, db, accrual, guard, orders, withdrawals, reconciler: None, last_error: None }
    }

    /// Stops the reconciler, if it is running, and waits for it to finish.
    pub async fn stop_reconciler(&mut self) {
        if let Some((cancel, handle)) = self.reconciler.take() {
            cancel.send_replace(true);
            handle.stopped().await;
        }
    }
}
