use std::{sync::Arc, time::Duration};

use accrual_client::AccrualApi;
use actix_web::{
    dev::Server,
    middleware::{Compress, Logger},
    web,
    App,
    HttpServer,
};
use log::info;
use loyalty_engine::{AuthApi, BalanceApi, OrderFlowApi, SqliteDatabase};

use crate::{
    accrual_worker::start_accrual_worker,
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    middleware::{BodyHashMiddlewareFactory, RateLimiter, RateLimiterMiddlewareFactory},
    routes::{get_balance, get_orders, get_withdrawals, health, login, register, upload_order, withdraw},
};

/// Requests allowed per second per principal, and the burst each bucket can absorb.
const RATE_LIMIT_PER_SEC: f64 = 100.0;
const RATE_LIMIT_BURST: f64 = 200.0;
/// Grace period for in-flight requests at shutdown.
const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Connects the database, runs migrations, launches the reconciliation worker and serves until the process
/// is asked to stop. The worker is cancelled once the HTTP server has drained.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_uri, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let accrual =
        AccrualApi::new(&config.accrual_address).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let worker =
        start_accrual_worker(db.clone(), accrual.clone(), Duration::from_secs(config.poll_interval_secs));

    let srv = create_server_instance(&config, db.clone(), accrual)?;
    let result = srv.await;

    info!("🛑️ HTTP server stopped. Cancelling the reconciliation worker.");
    worker.abort();
    db.close().await;
    result.map_err(ServerError::from)
}

/// Builds the actix server. Split from [`run_server`] so tests can construct an instance without binding
/// the production address.
pub fn create_server_instance(
    config: &ServerConfig,
    db: SqliteDatabase,
    accrual: AccrualApi,
) -> Result<Server, ServerError> {
    let secret = config.secret_key();
    let limiter = Arc::new(RateLimiter::new(RATE_LIMIT_PER_SEC, RATE_LIMIT_BURST));
    let srv = HttpServer::new(move || {
        let auth_api = AuthApi::new(db.clone());
        let order_api = OrderFlowApi::new(db.clone(), accrual.clone());
        let balance_api = BalanceApi::new(db.clone());
        let jwt_signer = TokenIssuer::new(&secret);
        let rate_limiter = RateLimiterMiddlewareFactory::new(Arc::clone(&limiter), jwt_signer.clone());
        App::new()
            .wrap(BodyHashMiddlewareFactory::new(secret.clone()))
            .wrap(rate_limiter)
            .wrap(Compress::default())
            .wrap(Logger::new("%t (%D ms) %s %a %U"))
            .app_data(web::Data::new(auth_api))
            .app_data(web::Data::new(order_api))
            .app_data(web::Data::new(balance_api))
            .app_data(web::Data::new(jwt_signer))
            .service(health)
            .service(
                web::scope("/api/user")
                    .route("/register", web::post().to(register::<SqliteDatabase>))
                    .route("/login", web::post().to(login::<SqliteDatabase>))
                    .route("/orders", web::post().to(upload_order::<SqliteDatabase, AccrualApi>))
                    .route("/orders", web::get().to(get_orders::<SqliteDatabase, AccrualApi>))
                    .route("/balance", web::get().to(get_balance::<SqliteDatabase>))
                    .route("/balance/withdraw", web::post().to(withdraw::<SqliteDatabase>))
                    .route("/withdrawals", web::get().to(get_withdrawals::<SqliteDatabase>)),
            )
    })
    .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
    .bind(config.run_address.as_str())?
    .run();
    Ok(srv)
}
