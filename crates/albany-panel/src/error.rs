//! Error types for panel operations.

use thiserror::Error;

/// Result type for panel operations.
pub type Result<T> = std::result::Result<T, PanelError>;

/// Errors that can occur while building or transforming panels.
#[derive(Debug, Error)]
pub enum PanelError {
    /// A required column is missing from an input frame.
    #[error("missing column '{0}' in input frame")]
    MissingColumn(String),

    /// A column has an unexpected dtype.
    #[error("column '{column}' has unexpected dtype: expected {expected}")]
    InvalidDtype {
        /// Column name.
        column: String,
        /// Expected dtype description.
        expected: String,
    },

    /// The period universe is empty, so no grid can be built.
    #[error("period universe is empty")]
    EmptyPeriodUniverse,

    /// Invalid configuration parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Polars error.
    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
