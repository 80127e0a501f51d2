//! Core domain types for the tpwatch position monitor.
//!
//! This crate provides the primitives shared by every other crate:
//! - `Price`: Precision-safe price type
//! - `NaturalKey`, `PositionId`: Position identity
//! - `Direction`, `TpLevel`, `CloseReason`, `PositionStatus`: Lifecycle enums

pub mod decimal;
pub mod error;
pub mod lifecycle;
pub mod market;

pub use decimal::{pnl_pct, Price};
pub use error::{CoreError, Result};
pub use lifecycle::{CloseReason, Direction, PositionStatus, TpLevel, MAX_TP_LEVELS};
pub use market::{NaturalKey, PositionId};
