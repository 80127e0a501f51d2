//! Authoritative in-memory position store.
//!
//! The store owns every [`Position`] record. Callers only ever receive
//! cloned snapshots; all mutation goes through [`PositionStore::apply_transition`]
//! (state machine) or [`PositionStore::mark_price`] (mark-to-market fields).
//!
//! # Locking
//!
//! A single `parking_lot::RwLock` guards the whole store. Transitions take
//! the write lock, so they are linearizable across all positions, and
//! readers (`get`, `list_open`, `summary`) take the read lock and therefore
//! never see a half-applied transition. No lock is ever held across an
//! `.await`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, trace};

use tpwatch_core::{
    pnl_pct, CloseReason, Direction, NaturalKey, PositionId, PositionStatus, Price, TpLevel,
};

use crate::error::{PositionError, PositionResult};
use crate::spec::PositionSpec;

// ============================================================================
// Position
// ============================================================================

/// One tracked trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub id: PositionId,
    pub key: NaturalKey,
    pub direction: Direction,
    pub entry_price: Price,
    pub stop_loss: Price,
    pub take_profits: Vec<Price>,
    /// One flag per take-profit level. Only ever flips false -> true.
    pub hit_flags: Vec<bool>,
    pub status: PositionStatus,
    /// Set iff `status == Closed`.
    pub close_reason: Option<CloseReason>,
    pub opened_at: DateTime<Utc>,
    /// Set iff `status == Closed`.
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_price: Option<Price>,
    pub realized_pnl_pct: Option<Decimal>,

    // Mark-to-market, refreshed on every priced update pass while open.
    pub last_price: Option<Price>,
    pub unrealized_pnl_pct: Option<Decimal>,
    pub max_pnl_pct: Decimal,
    pub min_pnl_pct: Decimal,
}

impl Position {
    fn open(id: PositionId, spec: PositionSpec, opened_at: DateTime<Utc>) -> Self {
        let levels = spec.take_profits.len();
        Self {
            id,
            key: spec.key,
            direction: spec.direction,
            entry_price: spec.entry_price,
            stop_loss: spec.stop_loss,
            take_profits: spec.take_profits,
            hit_flags: vec![false; levels],
            status: PositionStatus::Open,
            close_reason: None,
            opened_at,
            closed_at: None,
            exit_price: None,
            realized_pnl_pct: None,
            last_price: None,
            unrealized_pnl_pct: None,
            max_pnl_pct: Decimal::ZERO,
            min_pnl_pct: Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    #[must_use]
    pub fn is_hit(&self, level: TpLevel) -> bool {
        self.hit_flags.get(level.index()).copied().unwrap_or(false)
    }

    /// Price of a take-profit level, if the position has that many levels.
    #[must_use]
    pub fn target(&self, level: TpLevel) -> Option<Price> {
        self.take_profits.get(level.index()).copied()
    }

    /// The last configured level; hitting it closes the position.
    #[must_use]
    pub fn final_level(&self) -> Option<TpLevel> {
        self.take_profits
            .len()
            .checked_sub(1)
            .and_then(|i| TpLevel::from_index(i).ok())
    }

    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hit_flags.iter().filter(|hit| **hit).count()
    }

    /// Closed with positive realized P&L.
    #[must_use]
    pub fn is_win(&self) -> bool {
        !self.is_open() && self.realized_pnl_pct.is_some_and(|pnl| pnl > Decimal::ZERO)
    }

    fn close(&mut self, reason: CloseReason, exit_price: Price, at: DateTime<Utc>) {
        let pnl = pnl_pct(self.direction, self.entry_price, exit_price);
        self.status = PositionStatus::Closed;
        self.close_reason = Some(reason);
        self.closed_at = Some(at);
        self.exit_price = Some(exit_price);
        self.realized_pnl_pct = Some(pnl);
        self.unrealized_pnl_pct = None;
    }
}

// ============================================================================
// Transition
// ============================================================================

/// A single state change requested against one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Take-profit level reached at `price`. Hitting the final level also
    /// closes with `FinalTakeProfit`.
    TpHit { level: TpLevel, price: Price },
    /// Stop-loss reached at `price`; closes with `StopLoss`.
    SlHit { price: Price },
    /// Explicit close. Exits at the last marked price, else at entry.
    ManualClose { reason: CloseReason },
}

impl Transition {
    /// Metric/log label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TpHit { .. } => "tp_hit",
            Self::SlHit { .. } => "stop_loss",
            Self::ManualClose { reason } => reason.as_str(),
        }
    }
}

/// Result of [`PositionStore::apply_transition`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// State changed; carries the post-transition snapshot.
    Applied(Position),
    /// Already closed, or the level was already hit.
    Unchanged,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Point-in-time aggregate over every position in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub active: usize,
    pub closed: usize,
    pub wins: usize,
    pub losses: usize,
    /// wins / closed * 100, two decimal places. Zero when nothing closed.
    pub win_rate_pct: Decimal,
    /// Sum of realized P&L over closed positions.
    pub total_pnl_pct: Decimal,
    pub open_long: usize,
    pub open_short: usize,
    pub open_by_timeframe: BTreeMap<String, usize>,
}

// ============================================================================
// PositionStore
// ============================================================================

#[derive(Debug, Default)]
struct StoreInner {
    positions: HashMap<PositionId, Position>,
    /// Ids in insertion order.
    order: Vec<PositionId>,
    /// Natural key -> id of the OPEN position for that key.
    open_index: HashMap<NaturalKey, PositionId>,
    next_seq: u64,
}

/// Shared position store.
#[derive(Debug, Default)]
pub struct PositionStore {
    inner: RwLock<StoreInner>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `spec` and insert a new OPEN position.
    ///
    /// Fails with `InvalidSpec` if the spec is malformed or a position with
    /// the same natural key is already open.
    pub fn open(&self, spec: PositionSpec) -> PositionResult<PositionId> {
        spec.validate()?;

        let mut inner = self.inner.write();
        if let Some(existing) = inner.open_index.get(&spec.key) {
            return Err(PositionError::InvalidSpec(format!(
                "{} already has an open position ({existing})",
                spec.key
            )));
        }

        inner.next_seq += 1;
        let id = PositionId::new(&spec.key, inner.next_seq);
        let key = spec.key.clone();
        let position = Position::open(id.clone(), spec, Utc::now());

        info!(
            id = %id,
            key = %key,
            direction = %position.direction,
            entry = %position.entry_price,
            stop_loss = %position.stop_loss,
            levels = position.take_profits.len(),
            "Position opened"
        );

        inner.open_index.insert(key, id.clone());
        inner.order.push(id.clone());
        inner.positions.insert(id.clone(), position);
        Ok(id)
    }

    pub fn get(&self, id: &PositionId) -> Option<Position> {
        self.inner.read().positions.get(id).cloned()
    }

    /// Open positions, in insertion order.
    pub fn list_open(&self) -> Vec<Position> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.positions.get(id))
            .filter(|p| p.is_open())
            .cloned()
            .collect()
    }

    /// Every position, in insertion order.
    pub fn list_all(&self) -> Vec<Position> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.positions.get(id))
            .cloned()
            .collect()
    }

    /// The OPEN position for `key`, else the most recently opened CLOSED one.
    pub fn find_latest(&self, key: &NaturalKey) -> Option<Position> {
        let inner = self.inner.read();
        if let Some(id) = inner.open_index.get(key) {
            return inner.positions.get(id).cloned();
        }
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.positions.get(id))
            .find(|p| &p.key == key)
            .cloned()
    }

    pub fn open_count(&self) -> usize {
        self.inner.read().open_index.len()
    }

    /// Apply one transition atomically.
    ///
    /// `NotFound` if the id is unknown. Transitions against a CLOSED
    /// position, or a TP hit on an already-hit level, return `Unchanged`.
    pub fn apply_transition(
        &self,
        id: &PositionId,
        transition: Transition,
    ) -> PositionResult<TransitionOutcome> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let position = inner
            .positions
            .get_mut(id)
            .ok_or_else(|| PositionError::NotFound(id.clone()))?;

        if !position.is_open() {
            trace!(id = %id, kind = transition.kind(), "Transition on closed position ignored");
            return Ok(TransitionOutcome::Unchanged);
        }

        let now = Utc::now();
        match transition {
            Transition::TpHit { level, price } => {
                let Some(flag) = position.hit_flags.get_mut(level.index()) else {
                    return Err(PositionError::InvalidTransition {
                        id: id.clone(),
                        reason: format!("{level} not configured"),
                    });
                };
                if *flag {
                    trace!(id = %id, %level, "Level already hit");
                    return Ok(TransitionOutcome::Unchanged);
                }
                *flag = true;
                info!(id = %id, %level, %price, "Take-profit hit");

                if position.final_level() == Some(level) {
                    position.close(CloseReason::FinalTakeProfit, price, now);
                }
            }
            Transition::SlHit { price } => {
                position.close(CloseReason::StopLoss, price, now);
            }
            Transition::ManualClose { reason } => {
                let exit = position.last_price.unwrap_or(position.entry_price);
                position.close(reason, exit, now);
            }
        }

        let snapshot = position.clone();
        if !snapshot.is_open() {
            inner.open_index.remove(&snapshot.key);
            info!(
                id = %id,
                reason = ?snapshot.close_reason,
                exit = ?snapshot.exit_price.map(|p| p.to_string()),
                pnl_pct = ?snapshot.realized_pnl_pct.map(|p| p.to_string()),
                "Position closed"
            );
        }

        Ok(TransitionOutcome::Applied(snapshot))
    }

    /// Record a mark price against an open position and refresh its
    /// unrealized and excursion P&L. Returns the updated snapshot, or
    /// `None` if the position is unknown or already closed.
    pub fn mark_price(&self, id: &PositionId, price: Price) -> Option<Position> {
        let mut inner = self.inner.write();
        let position = inner.positions.get_mut(id).filter(|p| p.is_open())?;

        let pnl = pnl_pct(position.direction, position.entry_price, price);
        position.last_price = Some(price);
        position.unrealized_pnl_pct = Some(pnl);
        position.max_pnl_pct = position.max_pnl_pct.max(pnl);
        position.min_pnl_pct = position.min_pnl_pct.min(pnl);

        trace!(id = %id, %price, pnl_pct = %pnl, "Marked");
        Some(position.clone())
    }

    /// Aggregate statistics from a single consistent snapshot.
    pub fn summary(&self) -> Summary {
        let inner = self.inner.read();
        let mut summary = Summary {
            total: inner.positions.len(),
            ..Summary::default()
        };

        for position in inner.positions.values() {
            if position.is_open() {
                summary.active += 1;
                match position.direction {
                    Direction::Long => summary.open_long += 1,
                    Direction::Short => summary.open_short += 1,
                }
                *summary
                    .open_by_timeframe
                    .entry(position.key.timeframe.clone())
                    .or_default() += 1;
                continue;
            }

            summary.closed += 1;
            let pnl = position.realized_pnl_pct.unwrap_or_default();
            summary.total_pnl_pct += pnl;
            // Break-even closes count toward neither.
            if position.is_win() {
                summary.wins += 1;
            } else if pnl < Decimal::ZERO {
                summary.losses += 1;
            }
        }

        if summary.closed > 0 {
            summary.win_rate_pct = (Decimal::from(summary.wins) / Decimal::from(summary.closed)
                * Decimal::ONE_HUNDRED)
                .round_dp(2);
        }

        debug!(
            total = summary.total,
            active = summary.active,
            closed = summary.closed,
            "Summary computed"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn p(d: Decimal) -> Price {
        Price::new(d)
    }

    fn long_spec(symbol: &str) -> PositionSpec {
        PositionSpec {
            key: NaturalKey::new(symbol, "1h"),
            direction: Direction::Long,
            entry_price: p(dec!(100)),
            stop_loss: p(dec!(95)),
            take_profits: vec![p(dec!(110)), p(dec!(120)), p(dec!(130))],
        }
    }

    fn tp(level: TpLevel, price: Decimal) -> Transition {
        Transition::TpHit {
            level,
            price: p(price),
        }
    }

    #[test]
    fn test_open_assigns_sequential_ids() {
        let store = PositionStore::new();
        let a = store.open(long_spec("BTCUSDT")).unwrap();
        let b = store.open(long_spec("ETHUSDT")).unwrap();

        assert_eq!(a.as_str(), "BTCUSDT-1h-000001");
        assert_eq!(b.as_str(), "ETHUSDT-1h-000002");

        let listed: Vec<_> = store.list_open().into_iter().map(|p| p.id).collect();
        assert_eq!(listed, vec![a, b]);
    }

    #[test]
    fn test_open_rejects_invalid_spec() {
        let store = PositionStore::new();
        let mut spec = long_spec("BTCUSDT");
        spec.take_profits.reverse();
        assert!(matches!(
            store.open(spec),
            Err(PositionError::InvalidSpec(_))
        ));
        assert_eq!(store.summary().total, 0);
    }

    #[test]
    fn test_partial_then_final_take_profit() {
        let store = PositionStore::new();
        let id = store.open(long_spec("BTCUSDT")).unwrap();

        let outcome = store.apply_transition(&id, tp(TpLevel::Tp1, dec!(111))).unwrap();
        let TransitionOutcome::Applied(snapshot) = outcome else {
            panic!("expected Applied");
        };
        assert_eq!(snapshot.hit_flags, vec![true, false, false]);
        assert!(snapshot.is_open());
        assert!(snapshot.closed_at.is_none());

        store.apply_transition(&id, tp(TpLevel::Tp2, dec!(121))).unwrap();
        let outcome = store.apply_transition(&id, tp(TpLevel::Tp3, dec!(131))).unwrap();
        let TransitionOutcome::Applied(closed) = outcome else {
            panic!("expected Applied");
        };
        assert_eq!(closed.status, PositionStatus::Closed);
        assert_eq!(closed.close_reason, Some(CloseReason::FinalTakeProfit));
        assert_eq!(closed.realized_pnl_pct, Some(dec!(31)));
        assert!(closed.closed_at.is_some());
    }

    #[test]
    fn test_repeated_hit_is_unchanged() {
        let store = PositionStore::new();
        let id = store.open(long_spec("BTCUSDT")).unwrap();

        assert!(store
            .apply_transition(&id, tp(TpLevel::Tp1, dec!(110)))
            .unwrap()
            .is_applied());
        assert_eq!(
            store.apply_transition(&id, tp(TpLevel::Tp1, dec!(112))).unwrap(),
            TransitionOutcome::Unchanged
        );
    }

    #[test]
    fn test_closed_position_is_frozen() {
        let store = PositionStore::new();
        let id = store.open(long_spec("BTCUSDT")).unwrap();

        store
            .apply_transition(&id, Transition::SlHit { price: p(dec!(94)) })
            .unwrap();
        let closed = store.get(&id).unwrap();

        for transition in [
            tp(TpLevel::Tp1, dec!(110)),
            Transition::SlHit { price: p(dec!(90)) },
            Transition::ManualClose {
                reason: CloseReason::Manual,
            },
        ] {
            assert_eq!(
                store.apply_transition(&id, transition).unwrap(),
                TransitionOutcome::Unchanged
            );
        }
        assert!(store.mark_price(&id, p(dec!(200))).is_none());
        assert_eq!(store.get(&id).unwrap(), closed);
    }

    #[test]
    fn test_unknown_id_not_found() {
        let store = PositionStore::new();
        let err = store
            .apply_transition(&PositionId::from("nope"), Transition::SlHit { price: p(dec!(1)) })
            .unwrap_err();
        assert!(matches!(err, PositionError::NotFound(_)));
    }

    #[test]
    fn test_unconfigured_level_is_rejected() {
        let store = PositionStore::new();
        let mut spec = long_spec("BTCUSDT");
        spec.take_profits.truncate(1);
        let id = store.open(spec).unwrap();

        assert!(matches!(
            store.apply_transition(&id, tp(TpLevel::Tp2, dec!(120))),
            Err(PositionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_manual_close_uses_last_mark() {
        let store = PositionStore::new();
        let id = store.open(long_spec("BTCUSDT")).unwrap();

        let marked = store.mark_price(&id, p(dec!(104))).unwrap();
        assert_eq!(marked.unrealized_pnl_pct, Some(dec!(4)));
        store.mark_price(&id, p(dec!(97))).unwrap();
        let marked = store.mark_price(&id, p(dec!(102))).unwrap();
        assert_eq!(marked.max_pnl_pct, dec!(4));
        assert_eq!(marked.min_pnl_pct, dec!(-3));

        let outcome = store
            .apply_transition(
                &id,
                Transition::ManualClose {
                    reason: CloseReason::Manual,
                },
            )
            .unwrap();
        let TransitionOutcome::Applied(closed) = outcome else {
            panic!("expected Applied");
        };
        assert_eq!(closed.exit_price, Some(p(dec!(102))));
        assert_eq!(closed.realized_pnl_pct, Some(dec!(2)));
        assert_eq!(closed.unrealized_pnl_pct, None);
    }

    #[test]
    fn test_manual_close_without_mark_exits_at_entry() {
        let store = PositionStore::new();
        let id = store.open(long_spec("BTCUSDT")).unwrap();
        store
            .apply_transition(
                &id,
                Transition::ManualClose {
                    reason: CloseReason::Other,
                },
            )
            .unwrap();

        let closed = store.get(&id).unwrap();
        assert_eq!(closed.close_reason, Some(CloseReason::Other));
        assert_eq!(closed.realized_pnl_pct, Some(Decimal::ZERO));
        assert!(!closed.is_win());
    }

    #[test]
    fn test_find_latest_prefers_open() {
        let store = PositionStore::new();
        let key = NaturalKey::new("BTCUSDT", "1h");

        assert!(store.find_latest(&key).is_none());

        let first = store.open(long_spec("BTCUSDT")).unwrap();
        store
            .apply_transition(&first, Transition::SlHit { price: p(dec!(95)) })
            .unwrap();
        assert_eq!(store.find_latest(&key).unwrap().id, first);

        let second = store.open(long_spec("BTCUSDT")).unwrap();
        assert_eq!(store.find_latest(&key).unwrap().id, second);

        store
            .apply_transition(&second, Transition::SlHit { price: p(dec!(90)) })
            .unwrap();
        assert_eq!(store.find_latest(&key).unwrap().id, second);
    }

    #[test]
    fn test_summary_breakdown() {
        let store = PositionStore::new();
        let win = store.open(long_spec("BTCUSDT")).unwrap();
        let loss = store.open(long_spec("ETHUSDT")).unwrap();
        let flat = store.open(long_spec("SOLUSDT")).unwrap();
        store.open(long_spec("ADAUSDT")).unwrap();
        store
            .open(PositionSpec {
                key: NaturalKey::new("XRPUSDT", "4h"),
                direction: Direction::Short,
                entry_price: p(dec!(100)),
                stop_loss: p(dec!(105)),
                take_profits: vec![p(dec!(90))],
            })
            .unwrap();

        store.apply_transition(&win, tp(TpLevel::Tp1, dec!(110))).unwrap();
        store.apply_transition(&win, tp(TpLevel::Tp2, dec!(120))).unwrap();
        store.apply_transition(&win, tp(TpLevel::Tp3, dec!(130))).unwrap();
        store
            .apply_transition(&loss, Transition::SlHit { price: p(dec!(95)) })
            .unwrap();
        // Never marked, so it exits at entry with 0%.
        store
            .apply_transition(
                &flat,
                Transition::ManualClose {
                    reason: CloseReason::Manual,
                },
            )
            .unwrap();
        assert_eq!(store.get(&flat).unwrap().realized_pnl_pct, Some(dec!(0)));

        let summary = store.summary();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.active, 2);
        assert_eq!(summary.closed, 3);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.losses, 1);
        assert_eq!(summary.win_rate_pct, dec!(33.33));
        assert_eq!(summary.total_pnl_pct, dec!(25));
        assert_eq!(summary.open_long, 1);
        assert_eq!(summary.open_short, 1);
        assert_eq!(summary.open_by_timeframe.get("1h"), Some(&1));
        assert_eq!(summary.open_by_timeframe.get("4h"), Some(&1));
    }

    #[test]
    fn test_concurrent_transition_applies_once() {
        let store = Arc::new(PositionStore::new());
        let id = store.open(long_spec("BTCUSDT")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                std::thread::spawn(move || {
                    store
                        .apply_transition(&id, Transition::SlHit { price: p(dec!(94)) })
                        .unwrap()
                        .is_applied()
                })
            })
            .collect();

        let applied = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|applied| *applied)
            .count();
        assert_eq!(applied, 1);
        assert_eq!(store.summary().closed, 1);
    }
}
