use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    accrual::{AccrualError, AccrualOutcome},
    db_types::{OrderNumber, OrderStatusType, Points},
};

/// The order statuses as the accrual service reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl From<AccrualStatus> for OrderStatusType {
    fn from(status: AccrualStatus) -> Self {
        match status {
            AccrualStatus::Registered => OrderStatusType::New,
            AccrualStatus::Processing => OrderStatusType::Processing,
            AccrualStatus::Invalid => OrderStatusType::Invalid,
            AccrualStatus::Processed => OrderStatusType::Processed,
        }
    }
}

/// The body of a `200 OK` reply to `GET /api/orders/{number}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
}

/// Classifies a reply from the accrual service for the order `requested`.
///
/// * `200` with a well-formed body for the same order is `Resolved`.
/// * `429` with an integer `Retry-After` (in seconds) is `RateLimited`.
/// * Everything else, including a `204` for an order the service does not know, is `Failed`.
pub fn classify_response(
    requested: &OrderNumber,
    status: u16,
    retry_after: Option<&str>,
    body: &[u8],
) -> AccrualOutcome {
    match status {
        200 => match parse_body(requested, body) {
            Ok(outcome) => outcome,
            Err(e) => AccrualOutcome::Failed(e),
        },
        204 => AccrualOutcome::Failed(AccrualError::NotRegistered),
        429 => match parse_retry_after(retry_after) {
            Ok(retry_after) => AccrualOutcome::RateLimited { retry_after },
            Err(e) => AccrualOutcome::Failed(e),
        },
        code => AccrualOutcome::Failed(AccrualError::UnexpectedStatus(code)),
    }
}

fn parse_body(requested: &OrderNumber, body: &[u8]) -> Result<AccrualOutcome, AccrualError> {
    let response =
        serde_json::from_slice::<AccrualResponse>(body).map_err(|e| AccrualError::Decode(e.to_string()))?;
    if response.order != requested.as_str() {
        return Err(AccrualError::Decode(format!(
            "asked for order {} but the reply is for order {}",
            requested.as_str(),
            response.order
        )));
    }
    let status = OrderStatusType::from(response.status);
    let accrual = match (status, response.accrual) {
        (_, Some(amount)) if amount.is_negative() => {
            return Err(AccrualError::Decode(format!("accrual cannot be negative, got {amount}")));
        },
        (OrderStatusType::Processed, accrual) => accrual,
        _ => None,
    };
    Ok(AccrualOutcome::Resolved { status, accrual })
}

/// Longest retry delay accepted from the accrual service.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

fn parse_retry_after(value: Option<&str>) -> Result<Duration, AccrualError> {
    let value = value.ok_or_else(|| AccrualError::InvalidRetryAfter("header is missing".to_string()))?;
    let secs = value.trim().parse::<u64>().map_err(|_| AccrualError::InvalidRetryAfter(value.to_string()))?;
    let retry_after = Duration::from_secs(secs);
    if retry_after > MAX_RETRY_AFTER {
        return Err(AccrualError::InvalidRetryAfter(format!("{value} is longer than {}s", MAX_RETRY_AFTER.as_secs())));
    }
    Ok(retry_after)
}
