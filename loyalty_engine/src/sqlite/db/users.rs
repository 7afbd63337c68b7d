use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::User, traits::UserApiError};

/// Inserts a new user row. The caller is expected to have checked for an existing login inside the same
/// transaction; the unique constraint on `login` backstops the race.
pub async fn insert_user(login: &str, password_hash: &str, conn: &mut SqliteConnection) -> Result<User, UserApiError> {
    let user: User = sqlx::query_as(
        r#"
            INSERT INTO users (login, password_hash)
            VALUES ($1, $2)
            RETURNING *;
        "#,
    )
    .bind(login)
    .bind(password_hash)
    .fetch_one(conn)
    .await
    .map_err(map_insert_error)?;
    debug!("🧑️ User {login} inserted with id {}", user.id);
    Ok(user)
}

fn map_insert_error(e: sqlx::Error) -> UserApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => UserApiError::UserAlreadyExists,
        _ => e.into(),
    }
}

pub async fn fetch_user_by_login(login: &str, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE login = $1").bind(login).fetch_optional(conn).await?;
    Ok(user)
}
