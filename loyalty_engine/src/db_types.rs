use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use loyalty_common::Points;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        UserId         ---------------------------------------------------------
/// The internal identifier of a user. User records themselves are managed outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

//--------------------------------------      OrderNumber      ---------------------------------------------------------
/// An order number as submitted by a user: a non-empty string of ASCII digits. Order numbers are globally unique,
/// irrespective of who submitted them.
///
/// Checksum validation of the number is the responsibility of the request layer and is not performed here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderNumber {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConversionError(format!("'{s}' is not a valid order number")));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self {
        value.0
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatusType {
    /// The order has been submitted, but the accrual service has not started processing it.
    New,
    /// The accrual service is calculating the reward for the order.
    Processing,
    /// The accrual service rejected the order. No reward will be paid. Terminal.
    Invalid,
    /// The reward has been calculated. Terminal.
    Processed,
}

impl OrderStatusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatusType::New => "NEW",
            OrderStatusType::Processing => "PROCESSING",
            OrderStatusType::Invalid => "INVALID",
            OrderStatusType::Processed => "PROCESSED",
        }
    }

    /// Terminal statuses are never overwritten.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Invalid | OrderStatusType::Processed)
    }

    /// Orders only ever move forward: `New -> Processing -> {Invalid, Processed}`, where `Processing` may be skipped.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!((self, next), (New, Processing | Invalid | Processed) | (Processing, Invalid | Processed))
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub number: OrderNumber,
    pub user_id: UserId,
    pub status: OrderStatusType,
    /// The reward for the order. Only meaningful once the order is `Processed`.
    pub accrual: Points,
    pub uploaded_at: DateTime<Utc>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub number: OrderNumber,
    pub user_id: UserId,
}

impl NewOrder {
    pub fn new(number: OrderNumber, user_id: UserId) -> Self {
        Self { number, user_id }
    }
}

//--------------------------------------        Balance        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Balance {
    /// The spendable balance. Never negative.
    pub current: Points,
    /// The total amount ever withdrawn.
    pub withdrawn: Points,
}

//--------------------------------------      Withdrawal       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Withdrawal {
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub amount: Points,
    pub processed_at: DateTime<Utc>,
}
