use std::fmt::Debug;

use bcrypt::{hash, verify, DEFAULT_COST};
use log::debug;

use crate::{
    db_types::User,
    traits::{UserApiError, UserManagement},
};

/// Registration and credential verification.
///
/// Passwords are stored as bcrypt hashes (per-password salt, adaptive cost). Plaintext never reaches the
/// store and is never logged.
pub struct AuthApi<B> {
    db: B,
}

impl<B> Debug for AuthApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthApi")
    }
}

impl<B> AuthApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AuthApi<B>
where B: UserManagement
{
    /// Registers a new user. [`UserApiError::UserAlreadyExists`] passes through unchanged so the HTTP layer
    /// can answer 409.
    pub async fn register(&self, login: &str, password: &str) -> Result<User, UserApiError> {
        let password_hash = hash(password, DEFAULT_COST).map_err(|e| UserApiError::PasswordHash(e.to_string()))?;
        let user = self.db.create_user(login, &password_hash).await?;
        debug!("🧑️ Registered user #{} ({login})", user.id);
        Ok(user)
    }

    /// Verifies credentials and returns the user. An unknown login and a wrong password both come back as
    /// [`UserApiError::InvalidCredentials`]; callers cannot tell the two apart.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<User, UserApiError> {
        let Some(user) = self.db.fetch_user_by_login(login).await? else {
            return Err(UserApiError::InvalidCredentials);
        };
        let valid =
            verify(password, &user.password_hash).map_err(|e| UserApiError::PasswordHash(e.to_string()))?;
        if valid {
            Ok(user)
        } else {
            Err(UserApiError::InvalidCredentials)
        }
    }
}
