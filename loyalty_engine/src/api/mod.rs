//! Public service APIs of the engine.
//!
//! Each API wraps a storage backend (and, for order flow, an accrual gateway) behind the traits in
//! [`crate::traits`], keeping handlers and workers independent of the concrete database.
mod auth_api;
mod balance_api;
mod order_flow_api;

pub use auth_api::AuthApi;
pub use balance_api::BalanceApi;
pub use order_flow_api::{OrderFlowApi, TickOutcome, UploadOutcome};
