use log::*;
use loyalty_engine::{
    events::EventProducers,
    AccrualClient,
    BalanceGuard,
    Reconciler,
    ReconcilerConfig,
    ReconcilerHandle,
    ReconciliationBackend,
};
use tokio::sync::watch;

/// Starts the reconciliation engine. It runs until `true` is sent on the sender that `cancel` belongs to. Await
/// [`ReconcilerHandle::stopped`] to wait for the engine to drain.
pub fn start_reconciler<B, C>(
    db: B,
    accrual: C,
    guard: BalanceGuard,
    producers: EventProducers,
    config: ReconcilerConfig,
    cancel: watch::Receiver<bool>,
) -> ReconcilerHandle
where
    B: ReconciliationBackend,
    C: AccrualClient,
{
    info!(
        "🕰️ Reconciler scans every {}s using {} workers",
        config.scan_interval.as_secs_f64(),
        config.workers.max(1)
    );
    let handle = Reconciler::new(db, accrual, config).with_balance_guard(guard).with_producers(producers).start(cancel);
    let mut state = handle.subscribe();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            info!("🕰️ Reconciler is now {current}");
        }
    });
    handle
}
