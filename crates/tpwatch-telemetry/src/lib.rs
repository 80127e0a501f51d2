//! Prometheus metrics and structured logging for tpwatch.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus counters for update passes, transitions and price lookups

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
