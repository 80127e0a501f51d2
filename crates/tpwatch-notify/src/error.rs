//! Notification error types.

use thiserror::Error;

use tpwatch_position::SinkError;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Notifier not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Rejected by API ({status}): {body}")]
    Rejected { status: u16, body: String },
}

pub type NotifyResult<T> = Result<T, NotifyError>;

impl NotifyError {
    pub fn into_sink_error(self, sink: &str) -> SinkError {
        SinkError::new(sink, self.to_string())
    }
}
