//! Position lifecycle and monitoring engine.
//!
//! Tracks positions opened from detected signals, compares them against
//! live prices and walks each one through its take-profit levels to a
//! final close.
//!
//! # Key Components
//!
//! - [`PositionStore`]: Authoritative store and state machine
//! - [`evaluate`]: Pure threshold-crossing evaluation
//! - [`MonitoringEngine`]: One update pass over all open positions
//! - [`spawn_poller`]: Cancellable background update loop
//! - [`Lifecycle`]: Open/close/query facade
//! - [`EventSink`]: Best-effort consumer of committed transitions

pub mod error;
pub mod lifecycle;
pub mod monitor;
pub mod poller;
pub mod sink;
pub mod spec;
pub mod store;
pub mod threshold;

pub use error::{PositionError, PositionResult, SinkError};
pub use lifecycle::{Lifecycle, MonitorStatus, MAX_ENTRY_DEVIATION_PCT};
pub use monitor::{
    MonitorConfig, MonitorStatsSnapshot, MonitoringEngine, PassTrigger, UpdateReport,
    UpdateResult, DEFAULT_INTERVAL, DEFAULT_PRICE_TIMEOUT, MIN_INTERVAL,
};
pub use poller::{spawn_poller, PollerHandle};
pub use sink::{EventSink, NullSink, PositionEvent};
pub use spec::{PositionSpec, RiskLevels, RiskProfile, FALLBACK_TIMEFRAME};
pub use store::{Position, PositionStore, Summary, Transition, TransitionOutcome};
pub use threshold::{analyze, evaluate, LevelAnalysis, LevelKind};
