use std::time::Duration;

use log::*;
use tokio::{
    sync::{mpsc, watch},
    time::{interval, MissedTickBehavior},
};

use crate::{
    db::traits::OrderLedger,
    reconciler::{cancelled, Job, JobTracker},
};

/// Periodically looks for unresolved orders and queues a job for each one that is not already being worked on.
///
/// Returns when `cancel` fires. The scan loop owns a job queue sender, which is dropped on return.
pub async fn run_scan_loop<B: OrderLedger>(
    db: B,
    jobs: mpsc::Sender<Job>,
    tracker: JobTracker,
    scan_interval: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut timer = interval(scan_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("🔍️ Order scan loop started. Scanning every {}s", scan_interval.as_secs_f64());
    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            _ = timer.tick() => {},
        }
        let orders = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            result = db.fetch_unresolved_orders() => match result {
                Ok(orders) => orders,
                Err(e) => {
                    error!("🔍️ Could not fetch unresolved orders. Will try again next time: {e}");
                    continue;
                },
            },
        };
        let found = orders.len();
        let mut queued = 0usize;
        for order in orders {
            let number = order.number.clone();
            if !tracker.claim(&number) {
                trace!("🔍️ Order {number} is already being reconciled");
                continue;
            }
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    tracker.release(&number);
                    break;
                },
                result = jobs.send(Job::from(order)) => match result {
                    Ok(()) => queued += 1,
                    Err(e) => {
                        warn!("🔍️ Job queue is closed. Order {number} was not queued: {e}");
                        tracker.release(&number);
                        break;
                    },
                },
            }
        }
        debug!("🔍️ Scan complete. {found} unresolved orders found, {queued} queued");
    }
    info!("🔍️ Order scan loop stopped");
}
