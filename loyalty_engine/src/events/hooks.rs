use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, OrderUpdatedEvent, WithdrawalEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_updated_producer: Vec<EventProducer<OrderUpdatedEvent>>,
    pub withdrawal_producer: Vec<EventProducer<WithdrawalEvent>>,
}

impl EventProducers {
    pub async fn publish_order_updated(&self, event: OrderUpdatedEvent) {
        for emitter in &self.order_updated_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_withdrawal(&self, event: WithdrawalEvent) {
        for emitter in &self.withdrawal_producer {
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_updated: Option<EventHandler<OrderUpdatedEvent>>,
    pub on_withdrawal: Option<EventHandler<WithdrawalEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_updated = hooks.on_order_updated.map(|f| EventHandler::new(buffer_size, f));
        let on_withdrawal = hooks.on_withdrawal.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_updated, on_withdrawal }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_updated {
            result.order_updated_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_withdrawal {
            result.withdrawal_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_updated {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_withdrawal {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_updated: Option<Handler<OrderUpdatedEvent>>,
    pub on_withdrawal: Option<Handler<WithdrawalEvent>>,
}

impl EventHooks {
    pub fn on_order_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderUpdatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_updated = Some(Arc::new(f));
        self
    }

    pub fn on_withdrawal<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(WithdrawalEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_withdrawal = Some(Arc::new(f));
        self
    }
}
