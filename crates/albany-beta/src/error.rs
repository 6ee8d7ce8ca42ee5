//! Error types for beta estimation.

use thiserror::Error;

/// Result type for beta estimation.
pub type Result<T> = std::result::Result<T, BetaError>;

/// Errors that can occur during rolling beta estimation.
#[derive(Debug, Error)]
pub enum BetaError {
    /// Fewer paired observations than a slope fit needs.
    #[error("insufficient data: need at least {required} paired observations, got {actual}")]
    InsufficientData {
        /// Required number of paired observations.
        required: usize,
        /// Actual number of paired observations.
        actual: usize,
    },

    /// The regressor has zero variance within the window, so the slope is
    /// undefined.
    #[error("degenerate window: market factor has zero variance")]
    DegenerateWindow,

    /// Invalid configuration parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input slices disagree on length.
    #[error("mismatched input lengths: periods {periods}, dependent {dependent}, factor {factor}")]
    MismatchedLengths {
        /// Number of periods.
        periods: usize,
        /// Number of dependent observations.
        dependent: usize,
        /// Number of factor observations.
        factor: usize,
    },

    /// A required column is missing from the panel.
    #[error("missing column '{0}' in panel")]
    MissingColumn(String),

    /// Polars error.
    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
