//! Error types for the monitor
//!
//! Remote failures (`FetchError`, `AlertError`) are recoverable per token or
//! per alert. `MonitorError` is what aborts a cycle.

use thiserror::Error;

/// Failure talking to the market data API
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode API response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Decode(_) => false,
        }
    }
}

/// Failure delivering an alert
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alert request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Alert rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Errors that abort a monitor cycle or a command
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Price store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
