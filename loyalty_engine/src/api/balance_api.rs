use std::fmt::Debug;

use chrono::Utc;
use log::debug;

use crate::{
    db_types::{Balance, NewWithdrawal, Withdrawal},
    helpers::luhn_valid,
    traits::{BalanceApiError, BalanceManagement},
};

/// Balance reads and the debit path.
///
/// This API never reads a balance to decide whether a withdrawal fits; the sufficiency check lives inside
/// the backend's withdrawal transaction, so two racing withdrawals cannot both observe enough funds.
pub struct BalanceApi<B> {
    db: B,
}

impl<B> Debug for BalanceApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BalanceApi")
    }
}

impl<B> BalanceApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> BalanceApi<B>
where B: BalanceManagement
{
    pub async fn balance_for_user(&self, user_id: i64) -> Result<Balance, BalanceApiError> {
        self.db.fetch_balance(user_id).await
    }

    /// Debits the user's balance against a Luhn-valid order number of their choosing. The number does not
    /// have to correspond to an uploaded order.
    pub async fn withdraw(&self, user_id: i64, request: NewWithdrawal) -> Result<Withdrawal, BalanceApiError> {
        if !luhn_valid(&request.order_number) {
            return Err(BalanceApiError::InvalidOrderNumber);
        }
        if !request.sum.is_positive() {
            return Err(BalanceApiError::InvalidWithdrawalSum);
        }
        let withdrawal = self.db.withdraw(user_id, &request.order_number, request.sum, Utc::now()).await?;
        debug!("💰️ Withdrawal of {} recorded for user #{user_id}", withdrawal.sum);
        Ok(withdrawal)
    }

    pub async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, BalanceApiError> {
        self.db.fetch_withdrawals(user_id).await
    }
}

#[cfg(test)]
mod test {
    use chrono::{DateTime, Utc};
    use lpg_common::Points;
    use mockall::mock;

    use super::*;

    mock! {
        pub BalanceDb {}
        impl BalanceManagement for BalanceDb {
            async fn fetch_balance(&self, user_id: i64) -> Result<Balance, BalanceApiError>;
            async fn withdraw(
                &self,
                user_id: i64,
                order_number: &str,
                sum: Points,
                processed_at: DateTime<Utc>,
            ) -> Result<Withdrawal, BalanceApiError>;
            async fn fetch_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>, BalanceApiError>;
        }
    }

    fn request(order: &str, sum: Points) -> NewWithdrawal {
        NewWithdrawal { order_number: order.to_string(), sum }
    }

    #[tokio::test]
    async fn withdraw_rejects_invalid_order_numbers_before_any_io() {
        let mut db = MockBalanceDb::new();
        db.expect_withdraw().never();
        let api = BalanceApi::new(db);
        let err = api.withdraw(1, request("1234567890", Points::from_points(10))).await.unwrap_err();
        assert!(matches!(err, BalanceApiError::InvalidOrderNumber));
    }

    #[tokio::test]
    async fn withdraw_rejects_non_positive_sums() {
        let mut db = MockBalanceDb::new();
        db.expect_withdraw().never();
        let api = BalanceApi::new(db);
        for sum in [Points::ZERO, Points::from_points(-5)] {
            let err = api.withdraw(1, request("79927398713", sum)).await.unwrap_err();
            assert!(matches!(err, BalanceApiError::InvalidWithdrawalSum));
        }
    }

    #[tokio::test]
    async fn withdraw_passes_insufficient_funds_through() {
        let mut db = MockBalanceDb::new();
        db.expect_withdraw().returning(|_, _, _, _| Err(BalanceApiError::InsufficientFunds));
        let api = BalanceApi::new(db);
        let err = api.withdraw(1, request("79927398713", Points::from_points(1000))).await.unwrap_err();
        assert!(matches!(err, BalanceApiError::InsufficientFunds));
    }

    #[tokio::test]
    async fn withdraw_delegates_the_sufficiency_check_to_the_store() {
        let mut db = MockBalanceDb::new();
        db.expect_fetch_balance().never();
        db.expect_withdraw().withf(|user_id, order, sum, _| {
            *user_id == 1 && order == "79927398713" && *sum == Points::from_points(200)
        }).returning(|user_id, order, sum, processed_at| {
            Ok(Withdrawal { id: 1, order_number: order.to_string(), sum, processed_at, user_id })
        });
        let api = BalanceApi::new(db);
        let withdrawal = api.withdraw(1, request("79927398713", Points::from_points(200))).await.unwrap();
        assert_eq!(withdrawal.sum, Points::from_points(200));
    }
}
