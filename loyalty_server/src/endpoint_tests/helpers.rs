use actix_web::{body::MessageBody, dev::ServiceResponse, http::StatusCode};
use chrono::Utc;
use lpg_common::Secret;
use loyalty_engine::db_types::User;

use crate::auth::TokenIssuer;

pub const TEST_USER_ID: i64 = 7;

pub fn test_secret() -> Secret<String> {
    Secret::new("endpoint-test-secret".to_string())
}

pub fn test_issuer() -> TokenIssuer {
    TokenIssuer::new(&test_secret())
}

/// A valid `Authorization` header for [`TEST_USER_ID`].
pub fn auth_header() -> (&'static str, String) {
    let token = test_issuer().issue_token(TEST_USER_ID).expect("could not issue test token");
    ("Authorization", format!("Bearer {token}"))
}

pub fn test_user(id: i64, login: &str, password_hash: &str) -> User {
    User {
        id,
        login: login.to_string(),
        password_hash: password_hash.to_string(),
        created_at: Utc::now(),
        current_balance: Default::default(),
        withdrawn_balance: Default::default(),
    }
}

/// Collapses a test response into its status and body text.
pub async fn status_and_body(res: ServiceResponse) -> (StatusCode, String) {
    let status = res.status();
    let body = res.into_body().try_into_bytes().expect("body was streaming");
    (status, String::from_utf8_lossy(&body).into_owned())
}
