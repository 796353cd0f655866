use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde_json::json;

use crate::{
    accrual::{classify_response, AccrualClient, AccrualError, AccrualOutcome},
    db_types::OrderNumber,
};

/// [`AccrualClient`] that talks to the accrual service over HTTP.
#[derive(Clone)]
pub struct HttpAccrualClient {
    base_url: String,
    client: Arc<Client>,
}

impl HttpAccrualClient {
    /// Creates a new client for the accrual service at `base_url`. Every request is abandoned after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AccrualError> {
        let client =
            Client::builder().timeout(timeout).build().map_err(|e| AccrualError::Initialization(e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { base_url, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn fetch_order(&self, number: &OrderNumber) -> Result<AccrualOutcome, AccrualError> {
        let url = self.url(&format!("/api/orders/{}", number.as_str()));
        trace!("🧮️ Polling accrual service: {url}");
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let retry_after =
            response.headers().get(RETRY_AFTER).map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let body = response.bytes().await?;
        Ok(classify_response(number, status, retry_after.as_deref(), &body))
    }
}

impl AccrualClient for HttpAccrualClient {
    async fn poll(&self, number: &OrderNumber) -> AccrualOutcome {
        let outcome = self.fetch_order(number).await.unwrap_or_else(AccrualOutcome::Failed);
        trace!("🧮️ Accrual service replied for order {number}: {outcome:?}");
        outcome
    }

    async fn register_order(&self, number: &OrderNumber) -> Result<(), AccrualError> {
        let url = self.url("/api/orders");
        debug!("🧮️ Registering order {number} with the accrual service");
        let response = self.client.post(url).json(&json!({ "order": number.as_str() })).send().await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => {
                debug!("🧮️ Order {number} was already registered with the accrual service");
                Ok(())
            },
            s => Err(AccrualError::UnexpectedStatus(s.as_u16())),
        }
    }
}
