//! Client for the external accrual computation service.
//!
//! The accrual service classifies uploaded order numbers and decides how many loyalty points each order earns.
//! It exposes a single endpoint, `GET /api/orders/{number}`, which answers with one of three shapes:
//! a JSON classification (200), "order not known yet" (204), or a back-off demand (429).
//! [`AccrualApi`] normalises all three into [`AccrualPoll`] so that callers only ever deal with one type.

mod api;
mod data_objects;
mod error;

pub use api::{AccrualApi, AccrualGateway};
pub use data_objects::{AccrualOrderState, AccrualPoll, AccrualStatus};
pub use error::AccrualApiError;
