use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use lpg_common::Points;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------    OrderNumber      ---------------------------------------------------------

/// A user-supplied order number. Digits only, Luhn-valid, preserved as a string so that leading zeros and
/// arbitrary length survive round trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------    OrderStatus      ---------------------------------------------------------

/// The lifecycle state of an order. `Processed` and `Invalid` are terminal: a row in either state is never
/// mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Uploaded; the accrual service has not classified it yet.
    New,
    /// The accrual service is computing the award.
    Processing,
    /// Classified; points (possibly zero) have been awarded.
    Processed,
    /// The accrual service rejected the order. No points.
    Invalid,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Processed | OrderStatus::Invalid)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::Processing => write!(f, "PROCESSING"),
            OrderStatus::Processed => write!(f, "PROCESSED"),
            OrderStatus::Invalid => write!(f, "INVALID"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct OrderStatusConversionError(String);

impl FromStr for OrderStatus {
    type Err = OrderStatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "PROCESSED" => Ok(Self::Processed),
            "INVALID" => Ok(Self::Invalid),
            other => Err(OrderStatusConversionError(other.to_string())),
        }
    }
}

//--------------------------------------        User        ----------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub current_balance: Points,
    pub withdrawn_balance: Points,
}

//--------------------------------------        Order       ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Order {
    pub number: OrderNumber,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub user_id: i64,
}

/// An order as it enters the store. `accrual` is never set at intake; only the settlement transaction writes it.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub number: OrderNumber,
    pub status: OrderStatus,
    pub uploaded_at: DateTime<Utc>,
    pub user_id: i64,
}

impl NewOrder {
    pub fn new(number: OrderNumber, status: OrderStatus, user_id: i64) -> Self {
        Self { number, status, uploaded_at: Utc::now(), user_id }
    }
}

//--------------------------------------       Balance      ----------------------------------------------------------

/// A user's spendable and lifetime-withdrawn point totals. Both are denormalised columns on the users table,
/// maintained inside the same transaction as the event that changes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Balance {
    pub current: Points,
    pub withdrawn: Points,
}

//--------------------------------------     Withdrawal     ----------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Withdrawal {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "order")]
    pub order_number: String,
    pub sum: Points,
    pub processed_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub user_id: i64,
}

/// A withdrawal request: debit `sum` points against `order_number`. The order number need not correspond to a
/// stored order; it is any Luhn-valid number the user chose.
#[derive(Debug, Clone, Deserialize)]
pub struct NewWithdrawal {
    #[serde(rename = "order")]
    pub order_number: String,
    pub sum: Points,
}
