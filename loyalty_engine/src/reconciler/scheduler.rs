use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use log::*;
use tokio::{
    sync::{mpsc, watch},
    time::{sleep_until, Instant},
};

use crate::reconciler::{cancelled, Job, JobTracker};

/// A job that was rate-limited, and may be put back on the queue once `due` has passed.
#[derive(Debug)]
pub struct RetryRequest {
    pub job: Job,
    pub due: Instant,
}

struct Deferred {
    due: Instant,
    seq: u64,
    job: Job,
}

impl PartialEq for Deferred {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Deferred {}

impl PartialOrd for Deferred {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deferred {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Holds rate-limited jobs until they are due, then puts them back on the job queue.
///
/// A single task serves every deferred job, so a burst of rate-limited responses costs one heap entry each rather
/// than one sleeping task each. Jobs with the same due time are re-queued in the order they were deferred.
pub struct RetryScheduler {
    pending: BinaryHeap<Reverse<Deferred>>,
    seq: u64,
    requests: mpsc::UnboundedReceiver<RetryRequest>,
    jobs: mpsc::Sender<Job>,
    tracker: JobTracker,
}

impl RetryScheduler {
    pub fn new(requests: mpsc::UnboundedReceiver<RetryRequest>, jobs: mpsc::Sender<Job>, tracker: JobTracker) -> Self {
        Self { pending: BinaryHeap::new(), seq: 0, requests, jobs, tracker }
    }

    fn defer(&mut self, request: RetryRequest) {
        trace!(
            "⏳️ Order {} deferred until {:?} (attempt {})",
            request.job.order_number,
            request.due,
            request.job.attempts
        );
        self.seq += 1;
        self.pending.push(Reverse(Deferred { due: request.due, seq: self.seq, job: request.job }));
    }

    /// Runs until `cancel` fires. Pending retries are then discarded. Their orders are released, so that the next
    /// scan (or the next start-up) picks them up again.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        debug!("⏳️ Retry scheduler started");
        let mut requests_open = true;
        loop {
            let next_due = self.pending.peek().map(|Reverse(d)| d.due);
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => break,
                request = self.requests.recv(), if requests_open => match request {
                    Some(request) => self.defer(request),
                    None => requests_open = false,
                },
                _ = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                    if !self.requeue_next(&mut cancel).await {
                        break;
                    }
                },
            }
        }
        self.shutdown();
    }

    /// Puts the earliest deferred job back on the queue. Returns false if the scheduler should stop.
    async fn requeue_next(&mut self, cancel: &mut watch::Receiver<bool>) -> bool {
        let Some(Reverse(deferred)) = self.pending.pop() else {
            return true;
        };
        let job = deferred.job;
        let number = job.order_number.clone();
        trace!("⏳️ Retry for order {number} is due");
        tokio::select! {
            biased;
            _ = cancelled(cancel) => {
                self.tracker.release(&number);
                false
            },
            result = self.jobs.send(job) => match result {
                Ok(()) => true,
                Err(e) => {
                    warn!("⏳️ Job queue is closed. Retry for order {number} dropped: {e}");
                    self.tracker.release(&number);
                    false
                },
            },
        }
    }

    fn shutdown(mut self) {
        // Refuse further retries, but release the claims of requests that were already sent
        self.requests.close();
        while let Ok(request) = self.requests.try_recv() {
            self.defer(request);
        }
        let dropped = self.pending.len();
        for Reverse(deferred) in self.pending.drain() {
            self.tracker.release(&deferred.job.order_number);
        }
        info!("⏳️ Retry scheduler stopped. {dropped} pending retries were discarded");
    }
}
