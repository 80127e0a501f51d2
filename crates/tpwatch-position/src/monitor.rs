//! Monitoring engine: one update pass over every open position.
//!
//! A pass snapshots the open positions, fetches one price per distinct
//! symbol (concurrently, each under a timeout), evaluates thresholds on a
//! freshly marked snapshot and applies the resulting transitions through
//! the store. Events are dispatched only after all mutations of the pass
//! have been committed.
//!
//! Passes may overlap (background poller plus on-demand triggers). Only
//! transitions the store reports as `Applied` are reported or published,
//! so a crossing seen by two passes is committed and announced once.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use tpwatch_core::{CloseReason, PositionId, Price, TpLevel};
use tpwatch_feed::{CacheStats, PriceSource};
use tpwatch_telemetry::Metrics;

use crate::sink::{EventSink, PositionEvent};
use crate::store::{Position, PositionStore, Transition, TransitionOutcome};
use crate::threshold::evaluate;

/// Default polling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest allowed polling interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(10);

/// Default per-symbol price lookup deadline.
pub const DEFAULT_PRICE_TIMEOUT: Duration = Duration::from_millis(5000);

// ============================================================================
// Config / results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Poller tick interval.
    pub interval: Duration,
    /// Deadline for a single symbol's price lookup.
    pub price_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            price_timeout: DEFAULT_PRICE_TIMEOUT,
        }
    }
}

/// Who asked for an update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTrigger {
    Poller,
    OnDemand,
}

impl PassTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poller => "poller",
            Self::OnDemand => "on_demand",
        }
    }
}

/// What a pass changed on one position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateResult {
    /// Levels committed by this pass, ascending.
    pub tp_hits: Vec<TpLevel>,
    pub position_closed: bool,
    pub close_reason: Option<CloseReason>,
    /// Price the transitions were evaluated at.
    pub price: Price,
    pub realized_pnl_pct: Option<Decimal>,
}

impl UpdateResult {
    fn new(price: Price) -> Self {
        Self {
            tp_hits: Vec::new(),
            position_closed: false,
            close_reason: None,
            price,
            realized_pnl_pct: None,
        }
    }
}

/// Positions changed by a pass. Unchanged positions are omitted.
pub type UpdateReport = BTreeMap<PositionId, UpdateResult>;

// ============================================================================
// Stats
// ============================================================================

/// Engine counters, shared by every caller of the engine.
#[derive(Debug, Default)]
pub struct MonitorStats {
    passes: AtomicU64,
    positions_updated: AtomicU64,
    tp_hits: AtomicU64,
    stop_losses: AtomicU64,
    final_take_profits: AtomicU64,
    price_unavailable: AtomicU64,
    sink_failures: AtomicU64,
    last_pass_at: RwLock<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStatsSnapshot {
    pub passes: u64,
    pub positions_updated: u64,
    pub tp_hits: u64,
    pub stop_losses: u64,
    pub final_take_profits: u64,
    pub price_unavailable: u64,
    pub sink_failures: u64,
    pub last_pass_at: Option<DateTime<Utc>>,
}

impl MonitorStats {
    fn record_close(&self, reason: CloseReason) {
        let counter = match reason {
            CloseReason::StopLoss => &self.stop_losses,
            CloseReason::FinalTakeProfit => &self.final_take_profits,
            CloseReason::Manual | CloseReason::Other => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MonitorStatsSnapshot {
        MonitorStatsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            positions_updated: self.positions_updated.load(Ordering::Relaxed),
            tp_hits: self.tp_hits.load(Ordering::Relaxed),
            stop_losses: self.stop_losses.load(Ordering::Relaxed),
            final_take_profits: self.final_take_profits.load(Ordering::Relaxed),
            price_unavailable: self.price_unavailable.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            last_pass_at: *self.last_pass_at.read(),
        }
    }
}

// ============================================================================
// MonitoringEngine
// ============================================================================

pub struct MonitoringEngine {
    store: Arc<PositionStore>,
    prices: Arc<dyn PriceSource>,
    sink: Arc<dyn EventSink>,
    config: MonitorConfig,
    stats: MonitorStats,
}

impl MonitoringEngine {
    #[must_use]
    pub fn new(
        store: Arc<PositionStore>,
        prices: Arc<dyn PriceSource>,
        sink: Arc<dyn EventSink>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            prices,
            sink,
            config,
            stats: MonitorStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<PositionStore> {
        &self.store
    }

    pub fn config(&self) -> MonitorConfig {
        self.config
    }

    pub fn stats(&self) -> MonitorStatsSnapshot {
        self.stats.snapshot()
    }

    /// Fresh locally held price for `symbol`, without a lookup.
    pub fn cached_price(&self, symbol: &str) -> Option<Price> {
        self.prices.cached_price(symbol)
    }

    /// Cache counters of the price source, if it caches.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.prices.cache_stats()
    }

    /// Run one update pass on demand.
    pub async fn run_update_pass(&self) -> UpdateReport {
        self.run_pass(PassTrigger::OnDemand).await
    }

    pub(crate) async fn run_pass(&self, trigger: PassTrigger) -> UpdateReport {
        let started = Instant::now();
        let open = self.store.list_open();

        let symbols: BTreeSet<&str> = open.iter().map(|p| p.key.symbol.as_str()).collect();
        let prices = self.fetch_prices(symbols).await;

        let mut report = UpdateReport::new();
        let mut events = Vec::new();

        for position in &open {
            // Unavailable symbols are skipped; the position is retried next pass.
            let Some(price) = prices.get(position.key.symbol.as_str()).copied() else {
                continue;
            };
            if let Some(result) = self.update_position(position, price, &mut events) {
                report.insert(position.id.clone(), result);
            }
        }

        // Mutations are committed; notifications are best-effort from here.
        for event in &events {
            self.publish(event).await;
        }

        self.stats.passes.fetch_add(1, Ordering::Relaxed);
        *self.stats.last_pass_at.write() = Some(Utc::now());
        Metrics::update_pass(trigger.as_str());
        Metrics::open_positions(self.store.open_count());

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if report.is_empty() {
            debug!(
                trigger = trigger.as_str(),
                positions = open.len(),
                priced = prices.len(),
                elapsed_ms,
                "Update pass complete"
            );
        } else {
            info!(
                trigger = trigger.as_str(),
                positions = open.len(),
                priced = prices.len(),
                changed = report.len(),
                events = events.len(),
                elapsed_ms,
                "Update pass complete"
            );
        }

        report
    }

    /// Mark, evaluate and apply for one position.
    fn update_position(
        &self,
        position: &Position,
        price: Price,
        events: &mut Vec<PositionEvent>,
    ) -> Option<UpdateResult> {
        // Evaluate against the store's current state, not the pass snapshot.
        let current = self.store.mark_price(&position.id, price)?;

        let mut result = UpdateResult::new(price);
        let mut changed = false;

        for transition in evaluate(&current, price) {
            let snapshot = match self.store.apply_transition(&position.id, transition) {
                Ok(TransitionOutcome::Applied(snapshot)) => snapshot,
                Ok(TransitionOutcome::Unchanged) => {
                    trace!(id = %position.id, kind = transition.kind(), "Transition already applied");
                    continue;
                }
                Err(e) => {
                    warn!(id = %position.id, error = %e, "Transition failed");
                    continue;
                }
            };

            changed = true;

            if let Transition::TpHit { level, price } = transition {
                Metrics::transition(transition.kind());
                self.stats.tp_hits.fetch_add(1, Ordering::Relaxed);
                result.tp_hits.push(level);
                events.push(PositionEvent::TpHit {
                    position: snapshot.clone(),
                    level,
                    price,
                });
            }

            if !snapshot.is_open() {
                if let Some(reason) = snapshot.close_reason {
                    Metrics::transition(reason.as_str());
                    self.stats.record_close(reason);
                }
                result.position_closed = true;
                result.close_reason = snapshot.close_reason;
                result.realized_pnl_pct = snapshot.realized_pnl_pct;
                events.extend(PositionEvent::closed(snapshot));
            }
        }

        if changed {
            self.stats.positions_updated.fetch_add(1, Ordering::Relaxed);
        }
        changed.then_some(result)
    }

    /// Fetch one price per symbol concurrently. Failed, timed-out and
    /// non-positive lookups are left out of the map.
    async fn fetch_prices<'a>(&self, symbols: BTreeSet<&'a str>) -> HashMap<&'a str, Price> {
        let lookups = symbols.into_iter().map(|symbol| async move {
            let price = self.fetch_price(symbol).await;
            (symbol, price)
        });

        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(symbol, price)| price.map(|p| (symbol, p)))
            .collect()
    }

    async fn fetch_price(&self, symbol: &str) -> Option<Price> {
        let outcome =
            tokio::time::timeout(self.config.price_timeout, self.prices.get_price(symbol)).await;

        let price = match outcome {
            Ok(Ok(price)) if price.is_positive() => {
                Metrics::price_lookup("ok");
                return Some(price);
            }
            Ok(Ok(price)) => {
                warn!(symbol, %price, "Non-positive price treated as unavailable");
                Metrics::price_lookup("unavailable");
                None
            }
            Ok(Err(e)) => {
                warn!(symbol, error = %e, "Price unavailable, deferring to next pass");
                Metrics::price_lookup("unavailable");
                None
            }
            Err(_) => {
                warn!(
                    symbol,
                    timeout_ms = self.config.price_timeout.as_millis() as u64,
                    "Price lookup timed out, deferring to next pass"
                );
                Metrics::price_lookup("timeout");
                None
            }
        };

        self.stats.price_unavailable.fetch_add(1, Ordering::Relaxed);
        price
    }

    /// Deliver one event. Failures are logged and counted, never retried.
    /// Per-sink failure metrics are recorded by the sink that fans out.
    pub(crate) async fn publish(&self, event: &PositionEvent) {
        if let Err(e) = self.sink.publish(event).await {
            warn!(
                sink = self.sink.name(),
                event = event.name(),
                id = %event.position().id,
                error = %e,
                "Event delivery failed"
            );
            self.stats.sink_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::spec::PositionSpec;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use tpwatch_core::{Direction, NaturalKey};
    use tpwatch_feed::{BoxFuture, FeedError, FeedResult};

    /// Fixed prices per symbol; unknown symbols fail, "SLOW" never answers in time.
    struct FixedPrices(HashMap<String, Price>);

    impl PriceSource for FixedPrices {
        fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, FeedResult<Price>> {
            Box::pin(async move {
                if symbol == "SLOWUSDT" {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                self.0
                    .get(symbol)
                    .copied()
                    .ok_or_else(|| FeedError::SymbolNotFound(symbol.to_string()))
            })
        }
    }

    #[derive(Default)]
    struct FailingSink {
        attempts: Mutex<usize>,
    }

    impl EventSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn publish<'a>(&'a self, _event: &'a PositionEvent) -> BoxFuture<'a, Result<(), SinkError>> {
            Box::pin(async move {
                *self.attempts.lock() += 1;
                Err(SinkError::new("failing", "unreachable"))
            })
        }
    }

    fn spec(symbol: &str) -> PositionSpec {
        PositionSpec {
            key: NaturalKey::new(symbol, "1h"),
            direction: Direction::Long,
            entry_price: Price::new(dec!(100)),
            stop_loss: Price::new(dec!(95)),
            take_profits: vec![Price::new(dec!(110))],
        }
    }

    fn engine(prices: &[(&str, Decimal)], sink: Arc<dyn EventSink>) -> MonitoringEngine {
        let prices = prices
            .iter()
            .map(|(s, p)| (s.to_string(), Price::new(*p)))
            .collect();
        MonitoringEngine::new(
            Arc::new(PositionStore::new()),
            Arc::new(FixedPrices(prices)),
            sink,
            MonitorConfig {
                interval: MIN_INTERVAL,
                price_timeout: Duration::from_millis(50),
            },
        )
    }

    #[tokio::test]
    async fn test_unavailable_symbol_is_skipped() {
        let engine = engine(
            &[("BTCUSDT", dec!(111))],
            Arc::new(crate::sink::NullSink),
        );
        let btc = engine.store().open(spec("BTCUSDT")).unwrap();
        let eth = engine.store().open(spec("ETHUSDT")).unwrap();

        let report = engine.run_update_pass().await;

        assert_eq!(report.len(), 1);
        assert!(report[&btc].position_closed);
        assert!(engine.store().get(&eth).unwrap().is_open());
        assert!(engine.store().get(&eth).unwrap().last_price.is_none());
        assert_eq!(engine.stats().price_unavailable, 1);
    }

    #[tokio::test]
    async fn test_price_timeout_does_not_abort_pass() {
        let engine = engine(
            &[("BTCUSDT", dec!(94)), ("SLOWUSDT", dec!(200))],
            Arc::new(crate::sink::NullSink),
        );
        let btc = engine.store().open(spec("BTCUSDT")).unwrap();
        let slow = engine.store().open(spec("SLOWUSDT")).unwrap();

        let report = engine.run_update_pass().await;

        assert_eq!(report[&btc].close_reason, Some(CloseReason::StopLoss));
        assert!(!report.contains_key(&slow));
        assert!(engine.store().get(&slow).unwrap().is_open());
    }

    #[tokio::test]
    async fn test_non_positive_price_is_unavailable() {
        let engine = engine(&[("BTCUSDT", dec!(0))], Arc::new(crate::sink::NullSink));
        let id = engine.store().open(spec("BTCUSDT")).unwrap();

        assert!(engine.run_update_pass().await.is_empty());
        assert!(engine.store().get(&id).unwrap().is_open());
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_committed_state() {
        let sink = Arc::new(FailingSink::default());
        let engine = engine(&[("BTCUSDT", dec!(120))], sink.clone());
        let id = engine.store().open(spec("BTCUSDT")).unwrap();

        let report = engine.run_update_pass().await;
        assert_eq!(report[&id].tp_hits, vec![TpLevel::Tp1]);
        assert!(!engine.store().get(&id).unwrap().is_open());

        // tp_hit + position_closed, each attempted exactly once.
        assert_eq!(*sink.attempts.lock(), 2);
        let stats = engine.stats();
        assert_eq!(stats.sink_failures, 2);
        assert_eq!(stats.tp_hits, 1);
        assert_eq!(stats.final_take_profits, 1);
        assert_eq!(stats.positions_updated, 1);

        assert!(engine.run_update_pass().await.is_empty());
        assert_eq!(*sink.attempts.lock(), 2);
    }

    #[tokio::test]
    async fn test_pass_marks_open_positions() {
        let engine = engine(&[("BTCUSDT", dec!(104))], Arc::new(crate::sink::NullSink));
        let id = engine.store().open(spec("BTCUSDT")).unwrap();

        assert!(engine.run_update_pass().await.is_empty());
        let position = engine.store().get(&id).unwrap();
        assert_eq!(position.last_price, Some(Price::new(dec!(104))));
        assert_eq!(position.unrealized_pnl_pct, Some(dec!(4)));

        let stats = engine.stats();
        assert_eq!(stats.passes, 1);
        assert!(stats.last_pass_at.is_some());
    }
}
