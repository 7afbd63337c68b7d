//! Bearer-token authentication.
//!
//! Sessions are HS256 JWTs with two claims: the numeric `user_id` and `exp` (24 h after issue). The same
//! process-wide secret signs tokens and verifies them; [`JwtClaims`] implements `FromRequest`, so any
//! handler that takes it as a parameter is authenticated, and every failure mode (missing header, bad
//! format, bad signature, wrong algorithm, expiry, missing claim) surfaces as a detail-free 401.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lpg_common::Secret;
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, ServerError};

pub const TOKEN_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub user_id: i64,
    pub exp: i64,
}

/// Signs and verifies session tokens with the process secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenIssuer {
    pub fn new(secret: &Secret<String>) -> Self {
        let secret = secret.reveal().as_bytes();
        Self { encoding_key: EncodingKey::from_secret(secret), decoding_key: DecodingKey::from_secret(secret) }
    }

    pub fn issue_token(&self, user_id: i64) -> Result<String, AuthError> {
        let exp = (Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp();
        let claims = JwtClaims { user_id, exp };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    /// Verifies signature, algorithm and expiry, and deserializes the claims. A token missing the
    /// `user_id` claim fails deserialization and is rejected like any other invalid token.
    pub fn decode_claims(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Result<&str, AuthError> {
    let header = req.headers().get("Authorization").ok_or(AuthError::MissingAuthHeader)?;
    let value = header.to_str().map_err(|_| AuthError::PoorlyFormattedHeader)?;
    value.strip_prefix("Bearer ").ok_or(AuthError::PoorlyFormattedHeader)
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<TokenIssuer>>() {
            Some(issuer) => bearer_token(req)
                .and_then(|token| issuer.decode_claims(token))
                .map_err(ServerError::from),
            None => Err(ServerError::InitializeError("TokenIssuer is not configured".to_string())),
        };
        ready(result)
    }
}
