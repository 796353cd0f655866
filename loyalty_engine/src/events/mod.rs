//! Event hooks for order status changes and withdrawals. See [`EventHooks`] for how to subscribe.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
