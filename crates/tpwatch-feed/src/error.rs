//! Feed error types.
//!
//! Every variant means "price unavailable" to the monitoring engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid price for {symbol}: {price}")]
    InvalidPrice { symbol: String, price: String },

    #[error("Price lookup timed out: {symbol}")]
    Timeout { symbol: String },

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FeedResult<T> = Result<T, FeedError>;
