use std::time::Duration;

use cucumber::given;
use loyalty_engine::{Reconciler, ReconcilerConfig};
use tokio::sync::watch;

use crate::cucumber::{world::LoyaltySystem, LoyaltyWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut LoyaltyWorld) {
    let system = LoyaltySystem::new().await;
    world.system = Some(system);
}

#[given(expr = "the reconciler is running with a scan interval of {int}ms")]
async fn start_reconciler(world: &mut LoyaltyWorld, interval_ms: u64) {
    let system = world.system();
    let config = ReconcilerConfig {
        scan_interval: Duration::from_millis(interval_ms),
        poll_timeout: Duration::from_secs(1),
        workers: 2,
        queue_size: 16,
    };
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let handle = Reconciler::new(system.db.clone(), system.accrual.clone(), config)
        .with_balance_guard(system.guard.clone())
        .start(cancel_rx);
    system.reconciler = Some((cancel_tx, handle));
}
