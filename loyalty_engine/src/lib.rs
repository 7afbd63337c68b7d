//! Loyalty Points Engine
//!
//! The engine owns the order-lifecycle and balance-consistency core of the loyalty gateway: order intake with
//! Luhn validation and ownership resolution, the reconciliation pass that drives orders to a terminal state
//! against the external accrual service, and the transactional balance model that never over-withdraws.
//!
//! The library is divided into two main sections:
//! 1. Storage management. SQLite is the supported backend. You should never need to touch the database
//!    directly; the row types live in [`db_types`] and everything else goes through the public APIs.
//! 2. The service APIs ([`AuthApi`], [`OrderFlowApi`], [`BalanceApi`]), generic over the storage traits in
//!    [`traits`] so that tests can substitute mocks for the backend and for the accrual service.
//!
//! The only code path that credits a balance is the settlement transaction driven by
//! [`OrderFlowApi::reconcile_once`]; order intake and the HTTP layer never touch balances directly.
pub mod db_types;
pub mod helpers;
pub mod traits;

mod api;
mod sqlite;

pub use api::{AuthApi, BalanceApi, OrderFlowApi, TickOutcome, UploadOutcome};
pub use sqlite::SqliteDatabase;
