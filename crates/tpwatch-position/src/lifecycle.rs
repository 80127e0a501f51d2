//! Lifecycle API: the surface the signal detector and request layer call.

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{info, warn};

use tpwatch_core::{CloseReason, Direction, NaturalKey, PositionId, Price};
use tpwatch_feed::CacheStats;
use tpwatch_telemetry::Metrics;

use crate::error::{PositionError, PositionResult};
use crate::monitor::{MonitorStatsSnapshot, MonitoringEngine, UpdateReport};
use crate::poller::{spawn_poller, PollerHandle};
use crate::sink::PositionEvent;
use crate::spec::{PositionSpec, RiskProfile};
use crate::store::{Position, PositionStore, Summary, Transition, TransitionOutcome};
use crate::threshold::{analyze, LevelAnalysis};

/// Largest accepted distance, in percent, between a signal's entry price
/// and the cached market quote.
pub const MAX_ENTRY_DEVIATION_PCT: Decimal = dec!(30);

/// Monitor introspection.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub open_positions: usize,
    pub stats: MonitorStatsSnapshot,
    pub cache: Option<CacheStats>,
}

pub struct Lifecycle {
    engine: Arc<MonitoringEngine>,
    risk: RiskProfile,
    poller: Mutex<Option<PollerHandle>>,
}

impl Lifecycle {
    #[must_use]
    pub fn new(engine: Arc<MonitoringEngine>, risk: RiskProfile) -> Self {
        Self {
            engine,
            risk,
            poller: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<MonitoringEngine> {
        &self.engine
    }

    fn store(&self) -> &PositionStore {
        self.engine.store()
    }

    /// Open a position from an explicit spec.
    pub fn open(&self, spec: PositionSpec) -> PositionResult<PositionId> {
        let id = self.store().open(spec)?;
        Metrics::open_positions(self.store().open_count());
        Ok(id)
    }

    /// Open a position with levels derived from the timeframe's risk profile.
    ///
    /// The entry must be positive and, when the price source holds a fresh
    /// quote for the symbol, within [`MAX_ENTRY_DEVIATION_PCT`] of it.
    pub fn open_signal(
        &self,
        symbol: &str,
        timeframe: &str,
        direction: Direction,
        entry_price: Price,
    ) -> PositionResult<PositionId> {
        let key = NaturalKey::new(symbol, timeframe);
        self.check_entry(&key.symbol, entry_price)?;

        let levels = self.risk.levels_for(timeframe);
        let spec = PositionSpec::from_signal(key, direction, entry_price, &levels);
        self.open(spec)
    }

    fn check_entry(&self, symbol: &str, entry_price: Price) -> PositionResult<()> {
        if !entry_price.is_positive() {
            return Err(PositionError::InvalidSpec(format!(
                "entry price {entry_price} must be positive"
            )));
        }

        let Some(quote) = self.engine.cached_price(symbol) else {
            return Ok(());
        };
        let Some(deviation) = entry_price.pct_from(quote).map(|d| d.abs()) else {
            return Ok(());
        };
        if deviation > MAX_ENTRY_DEVIATION_PCT {
            warn!(
                symbol,
                entry = %entry_price,
                quote = %quote,
                deviation_pct = %deviation.round_dp(2),
                "Entry price too far from market"
            );
            return Err(PositionError::InvalidSpec(format!(
                "{symbol} entry {entry_price} is {}% from market {quote}",
                deviation.round_dp(2)
            )));
        }
        Ok(())
    }

    /// Close a position. Returns `false` if it was already closed.
    ///
    /// Exit is taken at the last marked price, or at entry when the
    /// position was never marked.
    pub async fn close(&self, id: &PositionId, reason: CloseReason) -> PositionResult<bool> {
        let outcome = self
            .store()
            .apply_transition(id, Transition::ManualClose { reason })?;

        let TransitionOutcome::Applied(snapshot) = outcome else {
            info!(id = %id, "Close requested on closed position");
            return Ok(false);
        };

        Metrics::transition(reason.as_str());
        Metrics::open_positions(self.store().open_count());

        match PositionEvent::closed(snapshot) {
            Some(event) => self.engine.publish(&event).await,
            None => warn!(id = %id, "Closed snapshot missing exit fields"),
        }
        Ok(true)
    }

    pub fn get(&self, id: &PositionId) -> Option<Position> {
        self.store().get(id)
    }

    /// The OPEN position for (symbol, timeframe), else the most recent
    /// CLOSED one.
    pub fn status(&self, symbol: &str, timeframe: &str) -> Option<Position> {
        self.store().find_latest(&NaturalKey::new(symbol, timeframe))
    }

    pub fn active_positions(&self) -> Vec<Position> {
        self.store().list_open()
    }

    pub fn all_positions(&self) -> Vec<Position> {
        self.store().list_all()
    }

    pub fn summary(&self) -> Summary {
        self.store().summary()
    }

    /// Run an update pass now, alongside the poller if it is running.
    pub async fn trigger_update(&self) -> UpdateReport {
        self.engine.run_update_pass().await
    }

    /// Threshold-by-threshold view of a position at `price`.
    pub fn level_analysis(
        &self,
        id: &PositionId,
        price: Price,
    ) -> PositionResult<Vec<LevelAnalysis>> {
        let position = self
            .store()
            .get(id)
            .ok_or_else(|| PositionError::NotFound(id.clone()))?;
        Ok(analyze(&position, price))
    }

    /// Start the background poller. Returns `false` if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_monitoring(&self) -> bool {
        let mut poller = self.poller.lock();
        if poller.as_ref().is_some_and(PollerHandle::is_running) {
            return false;
        }
        let interval = self.engine.config().interval;
        *poller = Some(spawn_poller(Arc::clone(&self.engine), interval));
        true
    }

    /// Stop the poller and wait for any in-flight pass to finish.
    /// Returns `false` if it was not running.
    pub async fn stop_monitoring(&self) -> bool {
        let handle = self.poller.lock().take();
        match handle {
            Some(handle) => {
                let was_running = handle.is_running();
                handle.shutdown().await;
                was_running
            }
            None => false,
        }
    }

    pub fn monitor_status(&self) -> MonitorStatus {
        let running = self
            .poller
            .lock()
            .as_ref()
            .is_some_and(PollerHandle::is_running);

        MonitorStatus {
            running,
            interval_secs: self.engine.config().interval.as_secs(),
            open_positions: self.store().open_count(),
            stats: self.engine.stats(),
            cache: self.engine.cache_stats(),
        }
    }
}
