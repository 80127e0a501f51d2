//! Outbound lifecycle events.
//!
//! Events are published only after the store has committed the
//! corresponding transition. A failed delivery is logged and counted by
//! the publisher and never rolls back or retries the mutation.

use rust_decimal::Decimal;
use serde::Serialize;

use tpwatch_core::{CloseReason, Price, TpLevel};
use tpwatch_feed::BoxFuture;

use crate::error::SinkError;
use crate::store::Position;

/// One committed lifecycle change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PositionEvent {
    TpHit {
        position: Position,
        level: TpLevel,
        price: Price,
    },
    PositionClosed {
        position: Position,
        reason: CloseReason,
        exit_price: Price,
        realized_pnl_pct: Decimal,
    },
}

impl PositionEvent {
    /// Build the close event from a closed snapshot.
    pub fn closed(position: Position) -> Option<Self> {
        let reason = position.close_reason?;
        let exit_price = position.exit_price?;
        let realized_pnl_pct = position.realized_pnl_pct?;
        Some(Self::PositionClosed {
            position,
            reason,
            exit_price,
            realized_pnl_pct,
        })
    }

    pub fn position(&self) -> &Position {
        match self {
            Self::TpHit { position, .. } | Self::PositionClosed { position, .. } => position,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TpHit { .. } => "tp_hit",
            Self::PositionClosed { .. } => "position_closed",
        }
    }
}

/// Best-effort event consumer (chat notifier, trade log, ...).
///
/// Uses `BoxFuture` so sinks can be held as `Arc<dyn EventSink>`.
pub trait EventSink: Send + Sync {
    /// Short name used in logs and the failure counter label.
    fn name(&self) -> &str;

    fn publish<'a>(&'a self, event: &'a PositionEvent) -> BoxFuture<'a, Result<(), SinkError>>;
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    fn publish<'a>(&'a self, _event: &'a PositionEvent) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async { Ok(()) })
    }
}
