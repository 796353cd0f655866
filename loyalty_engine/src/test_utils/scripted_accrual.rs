use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::time::Instant;

use crate::{
    accrual::{AccrualClient, AccrualError, AccrualOutcome},
    db_types::{OrderNumber, OrderStatusType, Points},
};

#[derive(Debug, Clone)]
pub enum Step {
    Reply(AccrualOutcome),
    /// Never reply.
    Hang,
}

impl Step {
    pub fn status(status: OrderStatusType) -> Self {
        Step::Reply(AccrualOutcome::Resolved { status, accrual: None })
    }

    pub fn processed(accrual: Points) -> Self {
        Step::Reply(AccrualOutcome::Resolved { status: OrderStatusType::Processed, accrual: Some(accrual) })
    }

    pub fn rate_limited(secs: u64) -> Self {
        Step::Reply(AccrualOutcome::RateLimited { retry_after: Duration::from_secs(secs) })
    }

    pub fn failed(e: AccrualError) -> Self {
        Step::Reply(AccrualOutcome::Failed(e))
    }
}

#[derive(Default)]
struct Script {
    steps: HashMap<OrderNumber, VecDeque<Step>>,
    polls: Vec<(OrderNumber, Instant)>,
    registered: Vec<OrderNumber>,
    fail_registration: bool,
}

/// An accrual client that plays back a per-order script. The last step of a script is repeated indefinitely. Orders
/// without a script are reported as not registered.
#[derive(Clone, Default)]
pub struct ScriptedAccrualClient {
    script: Arc<Mutex<Script>>,
}

impl ScriptedAccrualClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, number: &str, steps: Vec<Step>) -> &Self {
        let number = number.parse().expect("invalid order number");
        self.script.lock().unwrap().steps.insert(number, steps.into());
        self
    }

    pub fn fail_registration(&self) {
        self.script.lock().unwrap().fail_registration = true;
    }

    /// The times at which the given order was polled.
    pub fn polls_for(&self, number: &str) -> Vec<Instant> {
        let number = number.parse::<OrderNumber>().expect("invalid order number");
        self.script.lock().unwrap().polls.iter().filter(|(n, _)| *n == number).map(|(_, t)| *t).collect()
    }

    pub fn poll_count(&self) -> usize {
        self.script.lock().unwrap().polls.len()
    }

    pub fn registered(&self) -> Vec<OrderNumber> {
        self.script.lock().unwrap().registered.clone()
    }

    fn next_step(&self, number: &OrderNumber) -> Step {
        let mut script = self.script.lock().unwrap();
        script.polls.push((number.clone(), Instant::now()));
        match script.steps.get_mut(number) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
            Some(steps) => steps.front().cloned().unwrap_or(Step::failed(AccrualError::NotRegistered)),
            None => Step::failed(AccrualError::NotRegistered),
        }
    }
}

impl AccrualClient for ScriptedAccrualClient {
    async fn poll(&self, number: &OrderNumber) -> AccrualOutcome {
        match self.next_step(number) {
            Step::Reply(outcome) => outcome,
            Step::Hang => std::future::pending::<AccrualOutcome>().await,
        }
    }

    async fn register_order(&self, number: &OrderNumber) -> Result<(), AccrualError> {
        let mut script = self.script.lock().unwrap();
        if script.fail_registration {
            return Err(AccrualError::Network("connection refused".to_string()));
        }
        script.registered.push(number.clone());
        Ok(())
    }
}
