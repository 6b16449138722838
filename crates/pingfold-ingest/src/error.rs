//! Error types for ingestion.

use thiserror::Error;

/// Result type alias for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that can occur while normalizing and staging measurements.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    State(#[from] pingfold_state::StateError),

    #[error("malformed timestamp: {0}")]
    Timestamp(String),
}
