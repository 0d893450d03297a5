//! Error types for the bridge

use thiserror::Error;

/// Main error type for the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Device rejected the credentials")]
    Unauthorized,

    #[error("Device unreachable: {0}")]
    Unreachable(String),

    #[error("Device request timed out")]
    Timeout,

    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Schedule for {trigger} already holds {count} actions (limit {limit})")]
    CapacityExceeded {
        trigger: String,
        count: usize,
        limit: usize,
    },

    #[error("Favorites still changing after {0} rounds")]
    ConvergenceBoundExceeded(u32),

    #[error("Invalid trigger identifier: {0}")]
    InvalidTrigger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Shutdown error: {0}")]
    Shutdown(String),

    #[error("Discovery already running")]
    WizardBusy,

    #[error("No device answered within {0:?}")]
    WizardTimeout(std::time::Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Errors that mean the device can't currently be talked to at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            BridgeError::Unauthorized | BridgeError::Unreachable(_) | BridgeError::Timeout
        )
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BridgeError::Timeout
        } else if err.is_connect() {
            BridgeError::Unreachable(err.to_string())
        } else if err.is_decode() {
            BridgeError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            BridgeError::UnexpectedStatus(status.as_u16())
        } else {
            BridgeError::Unreachable(err.to_string())
        }
    }
}

impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        BridgeError::Internal(err.to_string())
    }
}
