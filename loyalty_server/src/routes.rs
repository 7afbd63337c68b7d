//! Request handler definitions.
//!
//! Handlers are generic over the engine's storage traits (and the accrual gateway where the order flow
//! needs it), so the endpoint tests can run them against mocks. The concrete types are filled in when the
//! routes are registered in [`crate::server`].
use accrual_client::AccrualGateway;
use actix_web::{get, web, HttpResponse, Responder};
use log::{debug, trace};
use loyalty_engine::{
    db_types::NewWithdrawal,
    traits::{BalanceManagement, OrderManagement, UserManagement},
    AuthApi,
    BalanceApi,
    OrderFlowApi,
    UploadOutcome,
};

use crate::{
    auth::{JwtClaims, TokenIssuer},
    data_objects::{AuthRequest, TokenResponse},
    errors::ServerError,
};

// ----------------------------------------------   Health   ---------------------------------------------------------

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------    Auth    ---------------------------------------------------------

/// `POST /api/user/register`. 200 with a session token, 409 when the login is taken.
pub async fn register<B: UserManagement>(
    api: web::Data<AuthApi<B>>,
    signer: web::Data<TokenIssuer>,
    body: web::Json<AuthRequest>,
) -> Result<HttpResponse, ServerError> {
    let AuthRequest { login, password } = body.into_inner();
    validate_credentials_shape(&login, &password)?;
    let user = api.register(&login, &password).await?;
    debug!("💻️ Registered user #{}", user.id);
    token_response(&signer, user.id)
}

/// `POST /api/user/login`. 200 with a session token, 401 on bad credentials.
pub async fn login<B: UserManagement>(
    api: web::Data<AuthApi<B>>,
    signer: web::Data<TokenIssuer>,
    body: web::Json<AuthRequest>,
) -> Result<HttpResponse, ServerError> {
    let AuthRequest { login, password } = body.into_inner();
    validate_credentials_shape(&login, &password)?;
    let user = api.authenticate(&login, &password).await?;
    trace!("💻️ User #{} logged in", user.id);
    token_response(&signer, user.id)
}

fn validate_credentials_shape(login: &str, password: &str) -> Result<(), ServerError> {
    if login.trim().is_empty() || password.is_empty() {
        return Err(ServerError::InvalidRequestBody("login and password must not be empty".to_string()));
    }
    Ok(())
}

fn token_response(signer: &TokenIssuer, user_id: i64) -> Result<HttpResponse, ServerError> {
    let token = signer.issue_token(user_id)?;
    Ok(HttpResponse::Ok()
        .insert_header(("Authorization", format!("Bearer {token}")))
        .json(TokenResponse { token }))
}

// ----------------------------------------------   Orders   ---------------------------------------------------------

/// `POST /api/user/orders`. The body is the raw order number. 202 for a new order, 200 for a repeat upload
/// by the same user, 409 when the number belongs to someone else, 422 for malformed numbers.
pub async fn upload_order<B, C>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B, C>>,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement,
    C: AccrualGateway,
{
    let number = String::from_utf8(body.to_vec())
        .map_err(|_| ServerError::InvalidRequestBody("body is not valid UTF-8".to_string()))?;
    let number = number.trim();
    if number.is_empty() {
        return Err(ServerError::InvalidRequestBody("order number missing from body".to_string()));
    }
    if !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ServerError::InvalidOrderNumber);
    }
    match api.upload_order(number, claims.user_id).await? {
        UploadOutcome::Accepted(order) => {
            debug!("💻️ Order [{}] accepted from user #{}", order.number, claims.user_id);
            Ok(HttpResponse::Accepted().finish())
        },
        UploadOutcome::AlreadyUploaded => Ok(HttpResponse::Ok().finish()),
    }
}

/// `GET /api/user/orders`. 200 with the caller's orders newest-first, 204 when there are none.
pub async fn get_orders<B, C>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement,
    C: AccrualGateway,
{
    let orders = api.orders_for_user(claims.user_id).await?;
    if orders.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(orders))
}

// ----------------------------------------------   Balance   --------------------------------------------------------

/// `GET /api/user/balance`.
pub async fn get_balance<B: BalanceManagement>(
    claims: JwtClaims,
    api: web::Data<BalanceApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let balance = api.balance_for_user(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

/// `POST /api/user/balance/withdraw`. 200 on success, 402 when the balance cannot cover the sum, 422 for a
/// bad order number, 400 for a non-positive sum.
pub async fn withdraw<B: BalanceManagement>(
    claims: JwtClaims,
    api: web::Data<BalanceApi<B>>,
    body: web::Json<NewWithdrawal>,
) -> Result<HttpResponse, ServerError> {
    api.withdraw(claims.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().finish())
}

/// `GET /api/user/withdrawals`. 200 newest-first, 204 when there are none.
pub async fn get_withdrawals<B: BalanceManagement>(
    claims: JwtClaims,
    api: web::Data<BalanceApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let withdrawals = api.withdrawals_for_user(claims.user_id).await?;
    if withdrawals.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(withdrawals))
}
