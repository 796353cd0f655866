use crate::db_types::{Balance, Order, Withdrawal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOrderResult {
    Inserted(Order),
    /// The order number was already taken. The stored order is returned, and it may belong to a different user.
    AlreadyExists(Order),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitResult {
    Debited(Withdrawal),
    /// The balance does not cover the requested amount. Nothing was written.
    InsufficientFunds(Balance),
    /// A withdrawal against this order number has already been made. Nothing was written.
    DuplicateWithdrawal,
}
