//! Error types for aggregation and lifecycle operations.

use thiserror::Error;

/// Result type alias for rollup operations.
pub type RollupResult<T> = Result<T, RollupError>;

/// Errors that can occur while aggregating or promoting.
#[derive(Debug, Error)]
pub enum RollupError {
    #[error(transparent)]
    State(#[from] pingfold_state::StateError),

    /// The horizon holds no qualifying records for the target. Surfaced
    /// explicitly so callers never hit an empty-reduction fault; report
    /// drivers skip the target and continue.
    #[error("no data for {target} in horizon {label}")]
    NoData { target: String, label: String },

    /// A report sink rejected a publish.
    #[error("report sink failed: {0}")]
    Sink(String),
}
