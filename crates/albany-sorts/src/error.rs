//! Error types for portfolio sorting.

use thiserror::Error;

/// Result type for portfolio sorting.
pub type Result<T> = std::result::Result<T, SortError>;

/// Errors that can occur during breakpoint computation and portfolio sorts.
#[derive(Debug, Error)]
pub enum SortError {
    /// A required column is missing from the input frame.
    #[error("missing required column: {0}")]
    MissingColumn(String),

    /// A column has an unexpected data type.
    #[error("column {column} has wrong dtype, expected {expected}")]
    InvalidDtype {
        /// Column name.
        column: String,
        /// Expected dtype.
        expected: String,
    },

    /// Breakpoint computation received no reference observations.
    #[error("no reference observations to compute breakpoints from")]
    EmptyReference,

    /// Invalid configuration parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Underlying polars error.
    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}
