use serde::{Deserialize, Serialize};

/// Body of `POST /api/user/register` and `POST /api/user/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequest {
    pub login: String,
    pub password: String,
}

/// Successful register/login answer. The same token is also set in the `Authorization` response header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}
