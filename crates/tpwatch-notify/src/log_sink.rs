//! Structured-log event sink.

use tracing::info;

use tpwatch_feed::BoxFuture;
use tpwatch_position::{EventSink, PositionEvent, SinkError};

/// Emits one `info!` line per event under the `tpwatch::events` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn name(&self) -> &str {
        "log"
    }

    fn publish<'a>(&'a self, event: &'a PositionEvent) -> BoxFuture<'a, Result<(), SinkError>> {
        match event {
            PositionEvent::TpHit {
                position,
                level,
                price,
            } => info!(
                target: "tpwatch::events",
                event = "tp_hit",
                position_id = %position.id,
                symbol = %position.key.symbol,
                timeframe = %position.key.timeframe,
                direction = %position.direction,
                %level,
                %price,
                hits = position.hit_count(),
                "Take-profit hit"
            ),
            PositionEvent::PositionClosed {
                position,
                reason,
                exit_price,
                realized_pnl_pct,
            } => info!(
                target: "tpwatch::events",
                event = "position_closed",
                position_id = %position.id,
                symbol = %position.key.symbol,
                timeframe = %position.key.timeframe,
                direction = %position.direction,
                %reason,
                %exit_price,
                pnl_pct = %realized_pnl_pct,
                "Position closed"
            ),
        }
        Box::pin(async { Ok(()) })
    }
}
