use std::future::Future;

use crate::{
    db::traits::{DebitResult, LoyaltyDatabase},
    db_types::{Balance, OrderNumber, Points, UserId, Withdrawal},
};

/// Per-user balances and the withdrawals made against them.
///
/// None of these methods serialise access to a user's balance on their own. Callers that read a balance and then
/// modify it must hold the user's [`crate::BalanceGuard`].
pub trait BalanceStore: LoyaltyDatabase {
    /// Returns the user's balance. A user that has never been credited has a zero balance.
    fn fetch_balance(&self, user_id: UserId) -> impl Future<Output = Result<Balance, Self::Error>> + Send;

    /// Adds `amount` to the user's current balance and returns the new balance.
    fn credit(&self, user_id: UserId, amount: Points) -> impl Future<Output = Result<Balance, Self::Error>> + Send;

    /// Moves `amount` from the user's current balance to their withdrawn total, and records the withdrawal against
    /// `order_number`, all in one transaction.
    ///
    /// If the current balance would become negative, or the order number has already been used for a withdrawal,
    /// nothing is written and the reason is returned in the [`DebitResult`].
    fn debit(
        &self,
        user_id: UserId,
        order_number: &OrderNumber,
        amount: Points,
    ) -> impl Future<Output = Result<DebitResult, Self::Error>> + Send;

    /// All withdrawals made by the user, oldest first.
    fn fetch_withdrawals_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Withdrawal>, Self::Error>> + Send;
}
