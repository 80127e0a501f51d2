//! Main application orchestration.
//!
//! Builds every component once from [`AppConfig`] and hands each one the
//! collaborators it needs:
//! - Ticker price source behind a freshness cache
//! - Position store, monitoring engine and lifecycle facade
//! - Event sinks (structured log, LINE when configured)
//! - Background poller, stopped on Ctrl-C

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use tpwatch_feed::{BinanceTickerSource, CachedPriceSource, PriceSource};
use tpwatch_notify::{FanoutSink, LineNotifier, TracingSink};
use tpwatch_position::{Lifecycle, MonitoringEngine, PositionStore};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Periodic status output interval (1 hour).
const STATUS_INTERVAL: Duration = Duration::from_secs(3600);

/// Main application.
pub struct Application {
    config: AppConfig,
    lifecycle: Arc<Lifecycle>,
    line: Option<Arc<LineNotifier>>,
}

impl Application {
    /// Create the application. No network traffic happens here.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let ticker = BinanceTickerSource::new(config.feed.base_url.clone(), config.request_timeout())?;
        let prices: Arc<dyn PriceSource> =
            Arc::new(CachedPriceSource::new(ticker, config.cache_ttl()));

        let line = match config.line.credentials() {
            Some((token, user_id)) => Some(Arc::new(LineNotifier::new(token, user_id)?)),
            None => {
                info!("LINE credentials not configured, events go to the log only");
                None
            }
        };

        let mut sinks = FanoutSink::new().with(Arc::new(TracingSink));
        if let Some(line) = &line {
            sinks = sinks.with(line.clone());
        }
        info!(sinks = ?sinks.names(), "Event sinks configured");

        let engine = MonitoringEngine::new(
            Arc::new(PositionStore::new()),
            prices,
            Arc::new(sinks),
            config.monitor.to_monitor_config(),
        );
        let lifecycle = Arc::new(Lifecycle::new(Arc::new(engine), config.risk.clone()));

        Ok(Self {
            config,
            lifecycle,
            line,
        })
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Open the positions listed under `[[watch]]`. Invalid entries are
    /// logged and skipped. Returns how many were opened.
    pub fn seed_watch_list(&self) -> usize {
        let mut opened = 0;
        for entry in &self.config.watch {
            match self.lifecycle.open_signal(
                &entry.symbol,
                &entry.timeframe,
                entry.direction,
                entry.entry_price,
            ) {
                Ok(id) => {
                    opened += 1;
                    info!(id = %id, "Watch entry opened");
                }
                Err(e) => warn!(
                    symbol = %entry.symbol,
                    timeframe = %entry.timeframe,
                    error = %e,
                    "Watch entry rejected"
                ),
            }
        }
        opened
    }

    /// Run until Ctrl-C, then stop the poller and report the final summary.
    pub async fn run(&self) -> AppResult<()> {
        self.lifecycle.start_monitoring();

        let mut status_interval = tokio::time::interval(STATUS_INTERVAL);
        // The first tick completes immediately.
        status_interval.tick().await;

        loop {
            tokio::select! {
                _ = status_interval.tick() => self.log_status(),

                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => info!("Shutdown signal received"),
                        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
                    }
                    break;
                }
            }
        }

        self.lifecycle.stop_monitoring().await;

        let summary = self.lifecycle.summary();
        info!(
            total = summary.total,
            active = summary.active,
            closed = summary.closed,
            win_rate_pct = %summary.win_rate_pct,
            total_pnl_pct = %summary.total_pnl_pct,
            "Final summary"
        );

        if let Some(line) = &self.line {
            if let Err(e) = line.send_summary(&summary).await {
                warn!(error = %e, "Failed to send final summary");
            }
        }

        Ok(())
    }

    fn log_status(&self) {
        let status = self.lifecycle.monitor_status();
        let summary = self.lifecycle.summary();
        info!(
            running = status.running,
            passes = status.stats.passes,
            open = status.open_positions,
            closed = summary.closed,
            win_rate_pct = %summary.win_rate_pct,
            price_unavailable = status.stats.price_unavailable,
            sink_failures = status.stats.sink_failures,
            cache_hit_rate_pct = status.cache.map(|c| c.hit_rate_pct()).unwrap_or_default(),
            "Periodic status"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchEntry;
    use rust_decimal_macros::dec;
    use tpwatch_core::{Direction, Price};

    fn watch(symbol: &str, timeframe: &str, entry: Price) -> WatchEntry {
        WatchEntry {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            direction: Direction::Long,
            entry_price: entry,
        }
    }

    #[test]
    fn test_seed_watch_list_skips_invalid() {
        let config = AppConfig {
            watch: vec![
                watch("BTCUSDT", "4h", Price::new(dec!(64000))),
                // Duplicate natural key.
                watch("BTCUSDT", "4h", Price::new(dec!(65000))),
                // Non-positive entry.
                watch("ETHUSDT", "1h", Price::ZERO),
                watch("ETHUSDT", "1d", Price::new(dec!(3000))),
            ],
            ..AppConfig::default()
        };
        let app = Application::new(config).unwrap();

        assert_eq!(app.seed_watch_list(), 2);
        assert_eq!(app.lifecycle().active_positions().len(), 2);

        let btc = app.lifecycle().status("BTCUSDT", "4h").unwrap();
        assert_eq!(btc.entry_price, Price::new(dec!(64000)));
        assert_eq!(btc.take_profits[0], Price::new(dec!(65920)));
    }

    #[test]
    fn test_monitor_status_before_start() {
        let app = Application::new(AppConfig::default()).unwrap();
        let status = app.lifecycle().monitor_status();
        assert!(!status.running);
        assert_eq!(status.interval_secs, 30);
        assert_eq!(status.cache.map(|c| c.ttl_secs), Some(30));
    }
}
