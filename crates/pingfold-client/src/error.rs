//! Error types for the measurement API client.

use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the measurement API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The API returned a non-success status.
    #[error("API returned status {0}")]
    Status(u16),

    /// Failed to parse a response body.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// A single HTTP call timed out.
    #[error("request timed out")]
    Timeout,

    /// A job never reached a terminal state within the polling deadline.
    #[error("measurement {job_id} still in progress after {waited_secs}s")]
    Stalled { job_id: String, waited_secs: u64 },
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Http(err.to_string())
        }
    }
}
