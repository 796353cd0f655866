//! # Order reconciliation
//!
//! The [`Reconciler`] keeps the order ledger in step with the accrual service. It runs three kinds of task, all
//! coordinated by a single cancellation signal:
//!
//! * a **scan loop** that periodically reads every unresolved order and queues a [`Job`] for it,
//! * a pool of **workers** that poll the accrual service for each job and commit what it reports,
//! * a **retry scheduler** that holds on to rate-limited jobs until the accrual service is ready for them again.
//!
//! When a worker learns that an order has been processed with a positive reward, it takes the owner's
//! [`BalanceGuard`] lock and commits the status change and the credit in a single transaction. Withdrawals take the
//! same lock, so the two never interleave.
//!
//! ## Shutdown
//! Cancelling the engine moves it to [`EngineState::Draining`]. The scan loop stops, and the retry scheduler discards
//! whatever it was holding. Since they own the only senders of the job queue, the queue then closes. The workers
//! finish whatever was already queued and exit, after which the engine is [`EngineState::Stopped`]. Each poll is
//! bounded by the poll timeout, so a hung accrual service cannot stall shutdown indefinitely.
mod job;
mod scan;
mod scheduler;
mod tracker;
mod worker;

use std::{fmt::Display, sync::Arc, time::Duration};

pub use job::Job;
use log::*;
use scheduler::RetryScheduler;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
pub use tracker::JobTracker;
use worker::Worker;

use crate::{accrual::AccrualClient, events::EventProducers, BalanceGuard, ReconciliationBackend};

/// Shortest scan interval and poll timeout the engine will run with.
const MIN_RECONCILER_PERIOD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Running,
    Draining,
    Stopped,
}

impl Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Running => write!(f, "Running"),
            EngineState::Draining => write!(f, "Draining"),
            EngineState::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How often to look for unresolved orders.
    pub scan_interval: Duration,
    /// Upper bound for a single accrual service request.
    pub poll_timeout: Duration,
    /// Number of worker tasks.
    pub workers: usize,
    /// Capacity of the job queue.
    pub queue_size: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(10),
            workers: 4,
            queue_size: 256,
        }
    }
}

pub struct Reconciler<B, C> {
    db: B,
    accrual: C,
    guard: BalanceGuard,
    producers: EventProducers,
    config: ReconcilerConfig,
}

impl<B, C> Reconciler<B, C>
where
    B: ReconciliationBackend,
    C: AccrualClient,
{
    pub fn new(db: B, accrual: C, config: ReconcilerConfig) -> Self {
        Self { db, accrual, guard: BalanceGuard::new(), producers: EventProducers::default(), config }
    }

    /// Use the given balance guard. It must be the same guard that the withdrawal path uses.
    pub fn with_balance_guard(mut self, guard: BalanceGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub fn balance_guard(&self) -> &BalanceGuard {
        &self.guard
    }

    /// Spawns the engine's tasks and returns immediately. The engine runs until `cancel` is set to `true` (or its
    /// sender is dropped).
    pub fn start(self, cancel: watch::Receiver<bool>) -> ReconcilerHandle {
        let workers = self.config.workers.max(1);
        let queue_size = self.config.queue_size.max(1);
        let scan_interval = at_least_min_period("scan interval", self.config.scan_interval);
        let poll_timeout = at_least_min_period("poll timeout", self.config.poll_timeout);
        let (state_tx, state_rx) = watch::channel(EngineState::Running);
        let (job_tx, job_rx) = mpsc::channel(queue_size);
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let tracker = JobTracker::new();
        info!(
            "🚦️ Starting reconciler with {workers} workers, a queue of {queue_size} and a poll timeout of {}s",
            poll_timeout.as_secs_f64()
        );

        let scheduler = RetryScheduler::new(retry_rx, job_tx.clone(), tracker.clone());
        let scheduler = tokio::spawn(scheduler.run(cancel.clone()));
        let scan = tokio::spawn(scan::run_scan_loop(
            self.db.clone(),
            job_tx,
            tracker.clone(),
            scan_interval,
            cancel.clone(),
        ));
        let queue = Arc::new(Mutex::new(job_rx));
        let worker_handles = (0..workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    db: self.db.clone(),
                    accrual: self.accrual.clone(),
                    guard: self.guard.clone(),
                    producers: self.producers.clone(),
                    tracker: tracker.clone(),
                    retries: retry_tx.clone(),
                    cancel: cancel.clone(),
                    poll_timeout,
                };
                tokio::spawn(worker.run(Arc::clone(&queue)))
            })
            .collect::<Vec<_>>();
        drop(retry_tx);

        let supervisor = tokio::spawn(supervise(cancel, state_tx, scan, scheduler, worker_handles));
        ReconcilerHandle { state: state_rx, supervisor }
    }
}

fn at_least_min_period(name: &str, value: Duration) -> Duration {
    if value < MIN_RECONCILER_PERIOD {
        warn!("🚦️ A {name} of {value:?} is too short. Using {MIN_RECONCILER_PERIOD:?} instead.");
        MIN_RECONCILER_PERIOD
    } else {
        value
    }
}

async fn supervise(
    mut cancel: watch::Receiver<bool>,
    state: watch::Sender<EngineState>,
    scan: JoinHandle<()>,
    scheduler: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
) {
    cancelled(&mut cancel).await;
    info!("🚦️ Reconciler is draining");
    state.send_replace(EngineState::Draining);
    if let Err(e) = scan.await {
        error!("🚦️ Scan loop did not shut down cleanly: {e}");
    }
    if let Err(e) = scheduler.await {
        error!("🚦️ Retry scheduler did not shut down cleanly: {e}");
    }
    for worker in workers {
        if let Err(e) = worker.await {
            error!("🚦️ Worker did not shut down cleanly: {e}");
        }
    }
    state.send_replace(EngineState::Stopped);
    info!("🚦️ Reconciler has stopped");
}

/// Resolves once cancellation has been requested. A dropped sender counts as a cancellation.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}

/// Observes a running reconciler.
pub struct ReconcilerHandle {
    state: watch::Receiver<EngineState>,
    supervisor: JoinHandle<()>,
}

impl ReconcilerHandle {
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// A receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.clone()
    }

    /// Waits until every engine task has exited.
    pub async fn stopped(self) {
        if let Err(e) = self.supervisor.await {
            error!("🚦️ Reconciler supervisor failed: {e}");
        }
    }
}
