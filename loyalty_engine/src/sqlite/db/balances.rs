use chrono::{DateTime, Utc};
use log::trace;
use lpg_common::Points;
use sqlx::SqliteConnection;

use crate::db_types::{Balance, Withdrawal};

/// The user's balance pair. Zeros when the user does not exist.
pub async fn fetch_balance(user_id: i64, conn: &mut SqliteConnection) -> Result<Balance, sqlx::Error> {
    let balance: Option<Balance> = sqlx::query_as(
        r#"SELECT current_balance AS current, withdrawn_balance AS withdrawn FROM users WHERE id = $1"#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(balance.unwrap_or_default())
}

/// Inserts a withdrawal row. Pair with [`debit_balance`] inside one transaction.
pub async fn insert_withdrawal(
    user_id: i64,
    order_number: &str,
    sum: Points,
    processed_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Withdrawal, sqlx::Error> {
    let withdrawal = sqlx::query_as(
        r#"
            INSERT INTO withdrawals (order_number, sum, processed_at, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_number)
    .bind(sum)
    .bind(processed_at)
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(withdrawal)
}

/// Moves `sum` from current to withdrawn, conditional on the current balance covering it. Returns the number
/// of rows affected: 0 means the user is missing or the balance is insufficient, and the enclosing
/// transaction must be rolled back.
pub async fn debit_balance(user_id: i64, sum: Points, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE users
            SET current_balance = current_balance - $1,
                withdrawn_balance = withdrawn_balance + $1
            WHERE id = $2 AND current_balance >= $1
        "#,
    )
    .bind(sum)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Adds a settled order's accrual to the owner's spendable balance. Runs inside the settlement transaction.
pub async fn credit_balance(user_id: i64, amount: Points, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    trace!("💰️ Crediting {amount} to user #{user_id}");
    sqlx::query("UPDATE users SET current_balance = current_balance + $1 WHERE id = $2")
        .bind(amount)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// All withdrawals for the given user, newest first.
pub async fn fetch_withdrawals(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Withdrawal>, sqlx::Error> {
    let withdrawals =
        sqlx::query_as("SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY processed_at DESC")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    Ok(withdrawals)
}
