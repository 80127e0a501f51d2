//! Threshold crossing evaluation.
//!
//! Pure functions over a [`Position`] snapshot and a price. Nothing here
//! touches the store; the monitoring engine applies the returned
//! transitions and the store decides whether they still take effect.

use rust_decimal::Decimal;
use serde::Serialize;

use tpwatch_core::{Price, TpLevel};

use crate::store::{Position, Transition};

/// Transitions newly triggered by `price`, in the order they must be applied.
///
/// - Closed positions never produce transitions.
/// - A reached stop-loss wins over any take-profit crossed by the same
///   sample and is returned alone.
/// - Otherwise every not-yet-hit take-profit level reached by `price` is
///   returned in ascending order, so a gap past several levels reports
///   all of them.
///
/// An empty vector means no-op.
#[must_use]
pub fn evaluate(position: &Position, price: Price) -> Vec<Transition> {
    if !position.is_open() {
        return Vec::new();
    }

    let direction = position.direction;
    if direction.reached_adverse(price, position.stop_loss) {
        return vec![Transition::SlHit { price }];
    }

    position
        .take_profits
        .iter()
        .zip(&position.hit_flags)
        .enumerate()
        .filter(|(_, (target, hit))| !**hit && direction.reached_favorable(price, **target))
        .filter_map(|(i, _)| TpLevel::from_index(i).ok())
        .map(|level| Transition::TpHit { level, price })
        .collect()
}

/// Level kind in a [`LevelAnalysis`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    TakeProfit(TpLevel),
    StopLoss,
}

/// Where one threshold stands relative to a price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelAnalysis {
    pub kind: LevelKind,
    pub target: Price,
    /// `(target - price) / price * 100`. Signed: positive means the target
    /// is above the price.
    pub distance_pct: Decimal,
    /// Already flagged as hit (take-profits only).
    pub hit: bool,
    /// Whether `price` reaches this threshold right now.
    pub reached: bool,
}

/// Per-level view of a position at `price`: one row per take-profit level
/// followed by the stop-loss row.
#[must_use]
pub fn analyze(position: &Position, price: Price) -> Vec<LevelAnalysis> {
    let direction = position.direction;
    let distance = |target: Price| {
        target
            .pct_from(price)
            .map(|pct| pct.round_dp(4))
            .unwrap_or_default()
    };

    let mut rows: Vec<LevelAnalysis> = position
        .take_profits
        .iter()
        .zip(&position.hit_flags)
        .enumerate()
        .filter_map(|(i, (target, hit))| {
            let level = TpLevel::from_index(i).ok()?;
            Some(LevelAnalysis {
                kind: LevelKind::TakeProfit(level),
                target: *target,
                distance_pct: distance(*target),
                hit: *hit,
                reached: direction.reached_favorable(price, *target),
            })
        })
        .collect();

    rows.push(LevelAnalysis {
        kind: LevelKind::StopLoss,
        target: position.stop_loss,
        distance_pct: distance(position.stop_loss),
        hit: false,
        reached: direction.reached_adverse(price, position.stop_loss),
    });

    rows
}
