//! `SqliteDatabase` is the concrete storage backend of the loyalty engine.
//!
//! It implements all the traits defined in the [`crate::traits`] module by composing the low-level row
//! functions from [`super::db`]. Every multi-write operation opens its transaction here, so callers never
//! hold one across an external call.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::debug;
use lpg_common::Points;
use sqlx::SqlitePool;

use super::db::{balances, new_pool, orders, run_migrations, users};
use crate::{
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

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Applies the embedded migrations. Called once at startup; safe to call again.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        run_migrations(&self.pool).await
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl UserManagement for SqliteDatabase {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User, UserApiError> {
        let mut tx = self.pool.begin().await?;
        if users::fetch_user_by_login(login, &mut tx).await?.is_some() {
            return Err(UserApiError::UserAlreadyExists);
        }
        let user = users::insert_user(login, password_hash, &mut tx).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<User>, UserApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_login(login, &mut conn).await?;
        Ok(user)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }

    async fn fetch_order_owner(&self, number: &OrderNumber) -> Result<Option<i64>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let owner = orders::fetch_order_owner(number, &mut conn).await?;
        Ok(owner)
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_unsettled_orders(&self) -> Result<Vec<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_unsettled_orders(&mut conn).await?;
        Ok(result)
    }

    /// The settlement transaction. Flipping the status and crediting the owner commit together or not at
    /// all, and the conditional update keeps terminal rows immutable, so an order can credit at most once.
    async fn settle_order(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Option<Points>,
    ) -> Result<Option<Order>, OrderApiError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::update_order_if_unsettled(number, status, accrual, &mut tx).await?;
        let Some(order) = updated else {
            debug!("🗃️ Order [{number}] is already terminal. Settlement skipped.");
            return Ok(None);
        };
        if order.status == OrderStatus::Processed {
            if let Some(amount) = order.accrual.filter(Points::is_positive) {
                balances::credit_balance(order.user_id, amount, &mut tx).await?;
            }
        }
        tx.commit().await?;
        debug!("🗃️ Order [{number}] settled as {status}");
        Ok(Some(order))
    }
}

impl BalanceManagement for SqliteDatabase {
    async fn fetch_balance(&self, user_id: i64) -> Result<Balance, BalanceApiError> {
        let mut conn = self.pool.acquire().await?;
        let balance = balances::fetch_balance(user_id, &mut conn).await?;
        Ok(balance)
    }

    async fn withdraw(
        &self,
        user_id: i64,
        order_number: &str,
        sum: Points,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, BalanceApiError> {
        let mut tx = self.pool.begin().await?;
        let withdrawal = balances::insert_withdrawal(user_id, order_number, sum, processed_at, &mut tx).await?;
        let affected = balances::debit_balance(user_id, sum, &mut tx).await?;
        if affected == 0 {
            // Dropping the transaction rolls the inserted withdrawal row back.
            return Err(BalanceApiError::InsufficientFunds);
        }
        tx.commit().await?;
        debug!("💰️ User #{user_id} withdrew {sum} against order [{order_number}]");
        Ok(withdrawal)
    }

    async fn fetch_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>, BalanceApiError> {
        let mut conn = self.pool.acquire().await?;
        let result = balances::fetch_withdrawals(user_id, &mut conn).await?;
        Ok(result)
    }
}
