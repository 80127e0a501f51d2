//! tpwatch: position lifecycle monitor.
//!
//! Wires the components together:
//! - Ticker price source behind a freshness cache
//! - Position store, monitoring engine and background poller
//! - Log and LINE event sinks

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
