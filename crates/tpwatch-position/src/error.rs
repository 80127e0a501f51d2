//! Position error types.

use thiserror::Error;

use tpwatch_core::PositionId;

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Invalid position spec: {0}")]
    InvalidSpec(String),

    #[error("Position not found: {0}")]
    NotFound(PositionId),

    #[error("Invalid transition for {id}: {reason}")]
    InvalidTransition { id: PositionId, reason: String },
}

pub type PositionResult<T> = Result<T, PositionError>;

/// Event sink delivery failure.
///
/// Carried back to the engine only so it can be logged and counted;
/// it never affects position state.
#[derive(Debug, Error)]
#[error("{sink}: {message}")]
pub struct SinkError {
    pub sink: String,
    pub message: String,
}

impl SinkError {
    pub fn new(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            message: message.into(),
        }
    }
}
