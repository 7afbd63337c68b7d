use thiserror::Error;

use crate::db_types::User;

#[derive(Debug, Clone, Error)]
pub enum UserApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("A user with this login already exists")]
    UserAlreadyExists,
    #[error("Invalid login or password")]
    InvalidCredentials,
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

impl From<sqlx::Error> for UserApiError {
    fn from(e: sqlx::Error) -> Self {
        UserApiError::DatabaseError(e.to_string())
    }
}

/// Storage operations for user rows.
#[allow(async_fn_in_trait)]
pub trait UserManagement {
    /// Creates a new user with the given (already hashed) password.
    ///
    /// The login uniqueness check runs inside the same transaction as the insert, and the unique constraint
    /// on the login column backstops the race; both surface as [`UserApiError::UserAlreadyExists`].
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User, UserApiError>;

    /// Fetches a user by login. `None` if no such user exists.
    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<User>, UserApiError>;
}
