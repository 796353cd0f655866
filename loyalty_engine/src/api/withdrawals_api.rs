use std::fmt::Debug;

use log::*;

use crate::{
    api::errors::WithdrawalsApiError,
    db::traits::{BalanceStore, DebitResult},
    db_types::{Balance, OrderNumber, Points, UserId, Withdrawal},
    events::{EventProducers, WithdrawalEvent},
    BalanceGuard,
};

/// `WithdrawalsApi` lets users spend their points and see what they have spent.
///
/// Withdrawals take the user's [`BalanceGuard`] lock before touching the balance. Pass in the same guard that the
/// [`crate::Reconciler`] uses, otherwise credits and debits for a user may interleave.
pub struct WithdrawalsApi<B> {
    db: B,
    guard: BalanceGuard,
    producers: EventProducers,
}

impl<B> Debug for WithdrawalsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WithdrawalsApi")
    }
}

impl<B> WithdrawalsApi<B> {
    pub fn new(db: B, guard: BalanceGuard, producers: EventProducers) -> Self {
        Self { db, guard, producers }
    }
}

impl<B> WithdrawalsApi<B>
where B: BalanceStore
{
    /// Withdraws `amount` from the user's balance against `order_number`.
    ///
    /// Fails with [`WithdrawalsApiError::InsufficientFunds`] if the balance does not cover the amount. In that case
    /// nothing is written.
    pub async fn withdraw(
        &self,
        user_id: UserId,
        order_number: OrderNumber,
        amount: Points,
    ) -> Result<Withdrawal, WithdrawalsApiError> {
        if !amount.is_positive() {
            return Err(WithdrawalsApiError::InvalidAmount(amount));
        }
        let result = {
            let _lock = self.guard.acquire(user_id).await;
            self.db
                .debit(user_id, &order_number, amount)
                .await
                .map_err(|e| WithdrawalsApiError::DatabaseError(e.to_string()))?
        };
        match result {
            DebitResult::Debited(withdrawal) => {
                info!("💸️ {user_id} withdrew {amount} against order {order_number}");
                self.producers.publish_withdrawal(WithdrawalEvent::new(withdrawal.clone())).await;
                Ok(withdrawal)
            },
            DebitResult::InsufficientFunds(balance) => {
                debug!("💸️ {user_id} cannot withdraw {amount}. Only {} available", balance.current);
                Err(WithdrawalsApiError::InsufficientFunds { requested: amount, available: balance.current })
            },
            DebitResult::DuplicateWithdrawal => Err(WithdrawalsApiError::DuplicateWithdrawal(order_number)),
        }
    }

    pub async fn balance(&self, user_id: UserId) -> Result<Balance, WithdrawalsApiError> {
        self.db.fetch_balance(user_id).await.map_err(|e| WithdrawalsApiError::DatabaseError(e.to_string()))
    }

    /// The user's withdrawals, oldest first.
    pub async fn withdrawals_for_user(&self, user_id: UserId) -> Result<Vec<Withdrawal>, WithdrawalsApiError> {
        self.db.fetch_withdrawals_for_user(user_id).await.map_err(|e| WithdrawalsApiError::DatabaseError(e.to_string()))
    }
}
