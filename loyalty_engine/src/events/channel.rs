//! Simple stateless pub-sub event handler
//!
//! Components of the engine publish events (an order changed status, a withdrawal was made) and subscribers react to
//! them. Subscribers only ever see the event itself, never the engine's internal state. Handlers can be async; each
//! event is handled on its own task, so a slow handler never holds up the reconciler.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for the in-flight handlers to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Only producers may keep the channel open, otherwise the handler would never shut down.
        drop(self.sender);
        let mut jobs = JoinSet::new();
        loop {
            tokio::select! {
                ev = self.listener.recv() => match ev {
                    Some(ev) => {
                        trace!("📬️ Handling event");
                        let handler = Arc::clone(&self.handler);
                        jobs.spawn(async move { (handler)(ev).await });
                    },
                    None => break,
                },
                Some(result) = jobs.join_next(), if !jobs.is_empty() => {
                    if let Err(e) = result {
                        warn!("📬️ Event handler task failed: {e}");
                    }
                },
            }
        }
        debug!("📬️ All producers are gone. Waiting for {} event handlers to complete", jobs.len());
        while let Some(result) = jobs.join_next().await {
            if let Err(e) = result {
                warn!("📬️ Event handler task failed: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}
