use lpg_common::Points;
use thiserror::Error;

use crate::db_types::{NewOrder, Order, OrderNumber, OrderStatus};

#[derive(Debug, Clone, Error)]
pub enum OrderApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid order number")]
    InvalidOrderNumber,
    #[error("Order [{0}] was already uploaded by another user")]
    OwnedByAnotherUser(OrderNumber),
    #[error("Order [{0}] already exists")]
    DuplicateOrder(OrderNumber),
}

impl From<sqlx::Error> for OrderApiError {
    fn from(e: sqlx::Error) -> Self {
        OrderApiError::DatabaseError(e.to_string())
    }
}

/// Storage operations for order rows.
///
/// Orders are inserted once and mutated by exactly one operation afterwards: [`OrderManagement::settle_order`].
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Inserts a new order row. Fails with [`OrderApiError::DuplicateOrder`] on a primary-key collision.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderApiError>;

    /// Returns the id of the user who uploaded this order number, or `None` if the number is unknown.
    async fn fetch_order_owner(&self, number: &OrderNumber) -> Result<Option<i64>, OrderApiError>;

    /// All orders uploaded by the given user, newest first.
    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderApiError>;

    /// Every order still in a non-terminal state (`NEW` or `PROCESSING`), oldest first, so the reconciler
    /// scans in a deterministic order.
    async fn fetch_unsettled_orders(&self) -> Result<Vec<Order>, OrderApiError>;

    /// Applies a reconciliation result in a single transaction.
    ///
    /// The status/accrual update is conditional on the row still being non-terminal; when the transition is
    /// to `PROCESSED` with a positive accrual, the owner's current balance is credited within the same
    /// transaction. Returns the updated order, or `None` when the row was already terminal and nothing was
    /// written. This conditional update is what makes crediting at-most-once.
    async fn settle_order(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Option<Points>,
    ) -> Result<Option<Order>, OrderApiError>;
}
