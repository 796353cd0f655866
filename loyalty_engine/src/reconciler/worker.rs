use std::{sync::Arc, time::Duration};

use log::*;
use tokio::{
    sync::{mpsc, watch, Mutex},
    time::{timeout, Instant},
};

use crate::{
    accrual::{AccrualClient, AccrualError, AccrualOutcome},
    db_types::{OrderStatusType, Points},
    events::{EventProducers, OrderUpdatedEvent},
    reconciler::{scheduler::RetryRequest, Job, JobTracker},
    BalanceGuard,
    ReconciliationBackend,
};

pub type JobQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Everything a worker needs to process a job. Cheap to clone; one copy per worker.
#[derive(Clone)]
pub struct Worker<B, C> {
    pub id: usize,
    pub db: B,
    pub accrual: C,
    pub guard: BalanceGuard,
    pub producers: EventProducers,
    pub tracker: JobTracker,
    pub retries: mpsc::UnboundedSender<RetryRequest>,
    pub cancel: watch::Receiver<bool>,
    pub poll_timeout: Duration,
}

impl<B, C> Worker<B, C>
where
    B: ReconciliationBackend,
    C: AccrualClient,
{
    /// Takes jobs off the shared queue until the queue is closed and empty.
    pub async fn run(self, queue: JobQueue) {
        debug!("👷️ Worker {} started", self.id);
        loop {
            let job = {
                let mut queue = queue.lock().await;
                queue.recv().await
            };
            match job {
                Some(job) => self.process(job).await,
                None => break,
            }
        }
        debug!("👷️ Worker {} stopped", self.id);
    }

    pub async fn process(&self, job: Job) {
        let number = job.order_number.clone();
        let claim = self.tracker.guard(number.clone());
        let outcome = match timeout(self.poll_timeout, self.accrual.poll(&number)).await {
            Ok(outcome) => outcome,
            Err(_) => AccrualOutcome::Failed(AccrualError::Timeout),
        };
        match outcome {
            AccrualOutcome::Failed(e) => {
                warn!("👷️ Could not get the accrual status of order {number}: {e}");
            },
            AccrualOutcome::RateLimited { retry_after } => {
                if self.defer(job, retry_after) {
                    // The claim stays with the scheduler until the retry runs
                    claim.hand_over();
                }
            },
            AccrualOutcome::Resolved { status, accrual } => self.apply(&job, status, accrual.unwrap_or_default()).await,
        }
    }

    /// Hands the job to the retry scheduler. Returns false if the job was not deferred.
    fn defer(&self, job: Job, retry_after: Duration) -> bool {
        let number = job.order_number.clone();
        if *self.cancel.borrow() {
            debug!("👷️ Order {number} was rate-limited, but the engine is shutting down. Not retrying");
            return false;
        }
        let Some(due) = Instant::now().checked_add(retry_after) else {
            warn!("👷️ Order {number} was rate-limited for {retry_after:?}, which is out of range. Not retrying");
            return false;
        };
        info!("👷️ Accrual service is rate-limiting. Order {number} will be retried in {}s", retry_after.as_secs());
        let request = RetryRequest { job: job.next_attempt(), due };
        match self.retries.send(request) {
            Ok(()) => true,
            Err(_) => {
                debug!("👷️ Retry scheduler has stopped. Order {number} will not be retried");
                false
            },
        }
    }

    async fn apply(&self, job: &Job, status: OrderStatusType, accrual: Points) {
        let number = &job.order_number;
        if status == job.status {
            trace!("👷️ Order {number} is still {status}");
            return;
        }
        if !job.status.can_transition_to(status) {
            debug!("👷️ Ignoring {status} for order {number}, which is already {}", job.status);
            return;
        }
        let result = if status == OrderStatusType::Processed && accrual.is_positive() {
            let _lock = self.guard.acquire(job.user_id).await;
            self.db.settle_processed_order(number, job.status, accrual).await.map(|owner| (owner, accrual))
        } else {
            // Nothing to credit, so no need for the balance lock
            let none = Points::default();
            self.db.update_order_status(number, job.status, status, none).await.map(|owner| (owner, none))
        };
        match result {
            Ok((owner, credited)) => {
                info!("👷️ Order {number} moved from {} to {status}. {owner} credited with {credited}", job.status);
                let event = OrderUpdatedEvent::new(number.clone(), owner, job.status, status, credited);
                self.producers.publish_order_updated(event).await;
            },
            Err(e) => {
                warn!("👷️ Could not update order {number} to {status}: {e}");
            },
        }
    }
}
