use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use loyalty_engine::traits::{BalanceApiError, OrderApiError, UserApiError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Authorization header missing")]
    MissingAuthHeader,
    #[error("Authorization header format must be Bearer {{token}}")]
    PoorlyFormattedHeader,
    #[error("Invalid or expired token")]
    InvalidToken(String),
    #[error("Could not issue token: {0}")]
    TokenIssue(String),
}

/// The single place where engine errors become HTTP statuses.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequestBody(String),
    #[error("Withdrawal sum must be positive")]
    InvalidWithdrawalSum,
    #[error("{0}")]
    AuthError(#[from] AuthError),
    #[error("Invalid login or password")]
    InvalidCredentials,
    #[error("Insufficient funds on the balance")]
    InsufficientFunds,
    #[error("A user with this login already exists")]
    UserExists,
    #[error("Order was already uploaded by another user")]
    OrderConflict,
    #[error("Invalid order number")]
    InvalidOrderNumber,
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Could not initialize the server. {0}")]
    InitializeError(String),
    #[error("Internal server error")]
    BackendError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) | Self::InvalidWithdrawalSum => StatusCode::BAD_REQUEST,
            Self::AuthError(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            Self::UserExists | Self::OrderConflict => StatusCode::CONFLICT,
            Self::InvalidOrderNumber => StatusCode::UNPROCESSABLE_ENTITY,
            Self::IOError(_) | Self::InitializeError(_) | Self::BackendError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            error!("💻️ Request failed: {self:?}");
        }
        HttpResponse::build(self.status_code()).insert_header(ContentType::plaintext()).body(self.to_string())
    }
}

impl From<UserApiError> for ServerError {
    fn from(e: UserApiError) -> Self {
        match e {
            UserApiError::UserAlreadyExists => ServerError::UserExists,
            UserApiError::InvalidCredentials => ServerError::InvalidCredentials,
            UserApiError::DatabaseError(s) | UserApiError::PasswordHash(s) => ServerError::BackendError(s),
        }
    }
}

impl From<OrderApiError> for ServerError {
    fn from(e: OrderApiError) -> Self {
        match e {
            OrderApiError::InvalidOrderNumber => ServerError::InvalidOrderNumber,
            OrderApiError::OwnedByAnotherUser(_) | OrderApiError::DuplicateOrder(_) => ServerError::OrderConflict,
            OrderApiError::DatabaseError(s) => ServerError::BackendError(s),
        }
    }
}

impl From<BalanceApiError> for ServerError {
    fn from(e: BalanceApiError) -> Self {
        match e {
            BalanceApiError::InsufficientFunds => ServerError::InsufficientFunds,
            BalanceApiError::InvalidOrderNumber => ServerError::InvalidOrderNumber,
            BalanceApiError::InvalidWithdrawalSum => ServerError::InvalidWithdrawalSum,
            BalanceApiError::DatabaseError(s) => ServerError::BackendError(s),
        }
    }
}
