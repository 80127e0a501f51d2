//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed error: {0}")]
    Feed(#[from] tpwatch_feed::FeedError),

    #[error("Position error: {0}")]
    Position(#[from] tpwatch_position::PositionError),

    #[error("Notify error: {0}")]
    Notify(#[from] tpwatch_notify::NotifyError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tpwatch_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
