use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AccrualApiError {
    #[error("Could not initialize accrual client: {0}")]
    Initialization(String),
    #[error("Transport error talking to the accrual service: {0}")]
    Transport(String),
    #[error("Could not decode accrual service response: {0}")]
    Decode(String),
    #[error("Accrual service answered with unexpected status {0}")]
    UnexpectedStatus(u16),
}

impl From<reqwest::Error> for AccrualApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AccrualApiError::Decode(e.to_string())
        } else {
            AccrualApiError::Transport(e.to_string())
        }
    }
}
