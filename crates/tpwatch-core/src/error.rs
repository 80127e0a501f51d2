//! Error types for tpwatch-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid take-profit level: {0}")]
    InvalidTpLevel(usize),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
