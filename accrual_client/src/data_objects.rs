use std::{fmt::Display, time::Duration};

use lpg_common::Points;
use serde::{Deserialize, Serialize};

/// The classification the accrual service assigns to an order.
///
/// `Registered` and `Processing` are interim states; `Invalid` and `Processed` are final verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl Display for AccrualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccrualStatus::Registered => write!(f, "REGISTERED"),
            AccrualStatus::Processing => write!(f, "PROCESSING"),
            AccrualStatus::Invalid => write!(f, "INVALID"),
            AccrualStatus::Processed => write!(f, "PROCESSED"),
        }
    }
}

/// The body of a successful accrual lookup.
///
/// `accrual` is only ever populated alongside [`AccrualStatus::Processed`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccrualOrderState {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
}

/// A single poll of the accrual service, with the service's three response shapes folded into one type.
#[derive(Debug, Clone, PartialEq)]
pub enum AccrualPoll {
    /// The service has classified the order (HTTP 200).
    Known(AccrualOrderState),
    /// The service does not know the order yet (HTTP 204).
    Unknown,
    /// The service demands a back-off (HTTP 429), optionally hinting how long via `Retry-After`.
    RateLimited(Option<Duration>),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_processed_order() {
        let json = r#"{"order":"12345678903","status":"PROCESSED","accrual":500}"#;
        let state: AccrualOrderState = serde_json::from_str(json).unwrap();
        assert_eq!(state.order, "12345678903");
        assert_eq!(state.status, AccrualStatus::Processed);
        assert_eq!(state.accrual, Some(Points::from_points(500)));
    }

    #[test]
    fn decode_fractional_accrual() {
        let json = r#"{"order":"9278923470","status":"PROCESSED","accrual":729.98}"#;
        let state: AccrualOrderState = serde_json::from_str(json).unwrap();
        assert_eq!(state.accrual, Some(Points::from_hundredths(72_998)));
    }

    #[test]
    fn decode_interim_order_without_accrual() {
        let json = r#"{"order":"346436439","status":"PROCESSING"}"#;
        let state: AccrualOrderState = serde_json::from_str(json).unwrap();
        assert_eq!(state.status, AccrualStatus::Processing);
        assert!(state.accrual.is_none());
    }

    #[test]
    fn decode_registered_and_invalid() {
        let registered: AccrualOrderState =
            serde_json::from_str(r#"{"order":"1","status":"REGISTERED"}"#).unwrap();
        assert_eq!(registered.status, AccrualStatus::Registered);
        let invalid: AccrualOrderState = serde_json::from_str(r#"{"order":"1","status":"INVALID"}"#).unwrap();
        assert_eq!(invalid.status, AccrualStatus::Invalid);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let json = r#"{"order":"1","status":"EXPLODED"}"#;
        assert!(serde_json::from_str::<AccrualOrderState>(json).is_err());
    }
}
