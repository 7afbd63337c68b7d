use std::time::Duration;

use log::trace;
use reqwest::{Client, StatusCode};

use crate::{
    data_objects::{AccrualOrderState, AccrualPoll},
    error::AccrualApiError,
};

/// Per-request hard deadline. A poll that takes longer than this is treated as a transport failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Anything that can answer "what does the accrual service currently say about this order number?".
///
/// The production implementation is [`AccrualApi`]; tests substitute mocks.
#[allow(async_fn_in_trait)]
pub trait AccrualGateway {
    async fn order_status(&self, number: &str) -> Result<AccrualPoll, AccrualApiError>;
}

/// Reqwest-backed accrual service client.
#[derive(Debug, Clone)]
pub struct AccrualApi {
    base_url: String,
    client: Client,
}

impl AccrualApi {
    pub fn new(base_url: &str) -> Result<Self, AccrualApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AccrualApiError::Initialization(e.to_string()))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    fn url(&self, number: &str) -> String {
        format!("{}/api/orders/{number}", self.base_url)
    }
}

impl AccrualGateway for AccrualApi {
    async fn order_status(&self, number: &str) -> Result<AccrualPoll, AccrualApiError> {
        let url = self.url(number);
        trace!("🧮️ Polling accrual service: {url}");
        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::OK => {
                let state = response.json::<AccrualOrderState>().await?;
                trace!("🧮️ Order [{number}] is {} at the accrual service", state.status);
                Ok(AccrualPoll::Known(state))
            },
            StatusCode::NO_CONTENT => Ok(AccrualPoll::Unknown),
            StatusCode::TOO_MANY_REQUESTS => {
                let hint = retry_after_hint(&response);
                Ok(AccrualPoll::RateLimited(hint))
            },
            other => Err(AccrualApiError::UnexpectedStatus(other.as_u16())),
        }
    }
}

/// Parses a `Retry-After` header given in whole seconds. Date-formatted values are ignored.
fn retry_after_hint(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
