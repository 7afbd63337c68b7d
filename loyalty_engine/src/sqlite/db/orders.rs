use log::debug;
use lpg_common::Points;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderNumber, OrderStatus},
    traits::OrderApiError,
};

/// Inserts a new order row. A primary-key collision maps to [`OrderApiError::DuplicateOrder`] so that the
/// intake path can re-resolve ownership instead of failing the request.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderApiError> {
    let number = order.number.clone();
    let inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (number, status, uploaded_at, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order.number)
    .bind(order.status)
    .bind(order.uploaded_at)
    .bind(order.user_id)
    .fetch_one(conn)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => OrderApiError::DuplicateOrder(number.clone()),
        _ => e.into(),
    })?;
    debug!("📝️ Order [{}] inserted as {} for user #{}", inserted.number, inserted.status, inserted.user_id);
    Ok(inserted)
}

/// Returns the id of the user who uploaded this number, or `None` when the number is unknown.
pub async fn fetch_order_owner(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, sqlx::Error> {
    let owner: Option<(i64,)> =
        sqlx::query_as("SELECT user_id FROM orders WHERE number = $1").bind(number.as_str()).fetch_optional(conn).await?;
    Ok(owner.map(|(id,)| id))
}

/// All orders for the given user, newest first.
pub async fn fetch_orders_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY uploaded_at DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Every order that the reconciler still has to drive to a terminal state, oldest first.
pub async fn fetch_unsettled_orders(conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders =
        sqlx::query_as("SELECT * FROM orders WHERE status IN ('NEW', 'PROCESSING') ORDER BY uploaded_at ASC")
            .fetch_all(conn)
            .await?;
    Ok(orders)
}

/// Overwrites status and accrual, conditional on the row still being non-terminal. Returns the updated row,
/// or `None` when the order was already terminal (or does not exist) and nothing was written.
pub async fn update_order_if_unsettled(
    number: &OrderNumber,
    status: OrderStatus,
    accrual: Option<Points>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET status = $1, accrual = $2
            WHERE number = $3 AND status IN ('NEW', 'PROCESSING')
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(accrual)
    .bind(number.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
