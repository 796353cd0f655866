use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccrualError {
    #[error("Could not reach the accrual service: {0}")]
    Network(String),
    #[error("The accrual service did not respond in time")]
    Timeout,
    #[error("Could not decode the accrual service response: {0}")]
    Decode(String),
    #[error("The accrual service responded with unexpected status code {0}")]
    UnexpectedStatus(u16),
    #[error("The accrual service rate-limited the request with an invalid Retry-After value: {0}")]
    InvalidRetryAfter(String),
    #[error("The order is not registered with the accrual service")]
    NotRegistered,
    #[error("Could not initialise the accrual client: {0}")]
    Initialization(String),
}

impl From<reqwest::Error> for AccrualError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
