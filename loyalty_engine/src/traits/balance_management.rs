use chrono::{DateTime, Utc};
use lpg_common::Points;
use thiserror::Error;

use crate::db_types::{Balance, Withdrawal};

#[derive(Debug, Clone, Error)]
pub enum BalanceApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Insufficient funds to complete the withdrawal")]
    InsufficientFunds,
    #[error("Invalid order number")]
    InvalidOrderNumber,
    #[error("Withdrawal sum must be positive")]
    InvalidWithdrawalSum,
}

impl From<sqlx::Error> for BalanceApiError {
    fn from(e: sqlx::Error) -> Self {
        BalanceApiError::DatabaseError(e.to_string())
    }
}

/// Storage operations for balances and withdrawals.
#[allow(async_fn_in_trait)]
pub trait BalanceManagement {
    /// The user's current and withdrawn totals. Both zero when the user does not exist.
    async fn fetch_balance(&self, user_id: i64) -> Result<Balance, BalanceApiError>;

    /// Records a withdrawal in a single transaction: inserts the withdrawal row, then debits
    /// `current_balance` and credits `withdrawn_balance`, conditional on `current_balance >= sum`. When the
    /// conditional update matches no row the transaction is rolled back and
    /// [`BalanceApiError::InsufficientFunds`] is returned, so two racing withdrawals can never both observe
    /// a sufficient balance.
    async fn withdraw(
        &self,
        user_id: i64,
        order_number: &str,
        sum: Points,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, BalanceApiError>;

    /// All withdrawals by the given user, newest first.
    async fn fetch_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>, BalanceApiError>;
}
