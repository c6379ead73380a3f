//! Error types for the BWT Perla core crate.

use thiserror::Error;

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, PerlaError>;

/// Errors raised while detecting, fetching from or configuring a device.
///
/// Decoding never produces one of these for missing registers; absent values
/// degrade to defaults inside the snapshot instead.
#[derive(Debug, Error)]
pub enum PerlaError {
    /// Host unreachable or the connection dropped.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request did not complete in time.
    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    /// The device rejected the configured code.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Unexpected HTTP status or JSON shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The host answered, but not like any known firmware.
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PerlaError {
    /// Whether the scheduler should simply try again on the next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PerlaError::Connection(_) | PerlaError::Timeout(_) | PerlaError::MalformedResponse(_)
        )
    }

    /// Whether the error needs the user to re-enter the code.
    pub fn is_auth(&self) -> bool {
        matches!(self, PerlaError::Auth(_))
    }

    /// Classify a failed HTTP request issued with `timeout_secs` as its limit.
    pub fn from_request(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            PerlaError::Timeout(timeout_secs)
        } else if e.is_decode() {
            PerlaError::MalformedResponse(format!("Body decode error: {}", e))
        } else {
            PerlaError::Connection(format!("HTTP request failed: {}", e))
        }
    }
}

impl From<serde_json::Error> for PerlaError {
    fn from(e: serde_json::Error) -> Self {
        PerlaError::MalformedResponse(format!("JSON parse error: {}", e))
    }
}

impl From<toml::de::Error> for PerlaError {
    fn from(e: toml::de::Error) -> Self {
        PerlaError::Configuration(format!("TOML parse error: {}", e))
    }
}

impl From<std::io::Error> for PerlaError {
    fn from(e: std::io::Error) -> Self {
        PerlaError::Configuration(format!("IO error: {}", e))
    }
}
