//! Human-readable text for chat notifications.

use std::fmt::Write as _;

use rust_decimal::Decimal;

use tpwatch_core::{CloseReason, Direction};
use tpwatch_position::{Position, PositionEvent, Summary};

fn signed_pct(pct: Decimal) -> String {
    let pct = pct.round_dp(2);
    if pct > Decimal::ZERO {
        format!("+{pct}%")
    } else {
        format!("{pct}%")
    }
}

fn pnl_marker(pct: Decimal) -> &'static str {
    if pct > Decimal::ZERO {
        "🟢"
    } else if pct < Decimal::ZERO {
        "🔴"
    } else {
        "⚫"
    }
}

fn header(position: &Position) -> String {
    let marker = match position.direction {
        Direction::Long => "🟢",
        Direction::Short => "🔴",
    };
    format!(
        "{marker} {} {}  [{}]\nEntry: {}",
        position.direction, position.key.symbol, position.key.timeframe, position.entry_price
    )
}

/// Render one lifecycle event.
pub fn render_event(event: &PositionEvent) -> String {
    let mut text = String::new();
    match event {
        PositionEvent::TpHit {
            position,
            level,
            price,
        } => {
            let _ = writeln!(text, "🎯 {level} HIT");
            let _ = writeln!(text, "{}", header(position));
            let _ = writeln!(text, "Price: {price}");
            if let Some(pnl) = position.unrealized_pnl_pct {
                let _ = writeln!(text, "P&L: {} {}", pnl_marker(pnl), signed_pct(pnl));
            }
            let _ = write!(
                text,
                "Levels hit: {}/{}",
                position.hit_count(),
                position.take_profits.len()
            );
        }
        PositionEvent::PositionClosed {
            position,
            reason,
            exit_price,
            realized_pnl_pct,
        } => {
            let title = match reason {
                CloseReason::StopLoss => "🛑 STOP LOSS",
                CloseReason::FinalTakeProfit => "🏁 FINAL TAKE PROFIT",
                CloseReason::Manual => "✋ CLOSED MANUALLY",
                CloseReason::Other => "🏁 CLOSED",
            };
            let _ = writeln!(text, "{title}");
            let _ = writeln!(text, "{}", header(position));
            let _ = writeln!(text, "Exit: {exit_price}");
            let _ = write!(
                text,
                "Realized: {} {}",
                pnl_marker(*realized_pnl_pct),
                signed_pct(*realized_pnl_pct)
            );
        }
    }
    text
}

/// Render a performance summary.
pub fn render_summary(summary: &Summary) -> String {
    let mut text = String::from("📊 SUMMARY\n");
    let _ = writeln!(text, "Positions: {}", summary.total);
    let _ = writeln!(
        text,
        "Active: {} (long {}, short {})",
        summary.active, summary.open_long, summary.open_short
    );
    let _ = writeln!(
        text,
        "Closed: {} (wins {}, losses {})",
        summary.closed, summary.wins, summary.losses
    );
    let _ = writeln!(text, "Win rate: {}%", summary.win_rate_pct.round_dp(2));
    let _ = write!(
        text,
        "Total P&L: {} {}",
        pnl_marker(summary.total_pnl_pct),
        signed_pct(summary.total_pnl_pct)
    );
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tpwatch_core::{NaturalKey, Price, TpLevel};
    use tpwatch_position::{PositionSpec, PositionStore, Transition, TransitionOutcome};

    fn long_position() -> (PositionStore, Position) {
        let store = PositionStore::new();
        let id = store
            .open(PositionSpec {
                key: NaturalKey::new("BTCUSDT", "1h"),
                direction: Direction::Long,
                entry_price: Price::new(dec!(100)),
                stop_loss: Price::new(dec!(95)),
                take_profits: vec![Price::new(dec!(110)), Price::new(dec!(120))],
            })
            .unwrap();
        let position = store.get(&id).unwrap();
        (store, position)
    }

    #[test]
    fn test_render_tp_hit() {
        let (store, position) = long_position();
        store.mark_price(&position.id, Price::new(dec!(112)));
        let outcome = store
            .apply_transition(
                &position.id,
                Transition::TpHit {
                    level: TpLevel::Tp1,
                    price: Price::new(dec!(112)),
                },
            )
            .unwrap();
        let TransitionOutcome::Applied(snapshot) = outcome else {
            panic!("expected Applied");
        };

        let text = render_event(&PositionEvent::TpHit {
            position: snapshot,
            level: TpLevel::Tp1,
            price: Price::new(dec!(112)),
        });
        assert!(text.starts_with("🎯 TP1 HIT"));
        assert!(text.contains("LONG BTCUSDT"));
        assert!(text.contains("P&L: 🟢 +12"));
        assert!(text.ends_with("Levels hit: 1/2"));
    }

    #[test]
    fn test_render_stop_loss() {
        let (store, position) = long_position();
        store
            .apply_transition(
                &position.id,
                Transition::SlHit {
                    price: Price::new(dec!(94)),
                },
            )
            .unwrap();
        let event = PositionEvent::closed(store.get(&position.id).unwrap()).unwrap();

        let text = render_event(&event);
        assert!(text.starts_with("🛑 STOP LOSS"));
        assert!(text.contains("Exit: 94"));
        assert!(text.contains("🔴 -6"));
    }

    #[test]
    fn test_render_summary() {
        let summary = Summary {
            total: 3,
            active: 1,
            closed: 2,
            wins: 1,
            losses: 1,
            win_rate_pct: dec!(50),
            total_pnl_pct: dec!(4.5),
            open_long: 1,
            ..Summary::default()
        };
        let text = render_summary(&summary);
        assert!(text.contains("Win rate: 50%"));
        assert!(text.contains("Total P&L: 🟢 +4.5%"));
    }
}
