use accrual_client::{AccrualApiError, AccrualGateway, AccrualPoll};
use chrono::{DateTime, Utc};
use lpg_common::Points;
use loyalty_engine::{
    db_types::{Balance, NewOrder, Order, OrderNumber, OrderStatus, User, Withdrawal},
    traits::{
        BalanceApiError,
        BalanceManagement,
        OrderApiError,
        OrderManagement,
        UserApiError,
        UserManagement,
    },
};
use mockall::mock;

mock! {
    pub UserDb {}
    impl UserManagement for UserDb {
        async fn create_user(&self, login: &str, password_hash: &str) -> Result<User, UserApiError>;
        async fn fetch_user_by_login(&self, login: &str) -> Result<Option<User>, UserApiError>;
    }
}

mock! {
    pub OrderDb {}
    impl OrderManagement for OrderDb {
        async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderApiError>;
        async fn fetch_order_owner(&self, number: &OrderNumber) -> Result<Option<i64>, OrderApiError>;
        async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderApiError>;
        async fn fetch_unsettled_orders(&self) -> Result<Vec<Order>, OrderApiError>;
        async fn settle_order(
            &self,
            number: &OrderNumber,
            status: OrderStatus,
            accrual: Option<Points>,
        ) -> Result<Option<Order>, OrderApiError>;
    }
}

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

mock! {
    pub Accrual {}
    impl AccrualGateway for Accrual {
        async fn order_status(&self, number: &str) -> Result<AccrualPoll, AccrualApiError>;
    }
}
