//! Outbound event sinks.
//!
//! - [`TracingSink`]: one structured log line per event
//! - [`LineNotifier`]: LINE Messaging API push messages
//! - [`FanoutSink`]: delivers to several sinks, isolating their failures

pub mod error;
pub mod fanout;
pub mod line;
pub mod log_sink;
pub mod message;

pub use error::{NotifyError, NotifyResult};
pub use fanout::FanoutSink;
pub use line::{LineNotifier, LINE_PUSH_URL};
pub use log_sink::TracingSink;
pub use message::{render_event, render_summary};
