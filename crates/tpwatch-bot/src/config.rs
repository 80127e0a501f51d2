//! Application configuration.
//!
//! Loaded once from TOML at startup, validated, then handed to the
//! components that need it.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tpwatch_core::{Direction, Price, MAX_TP_LEVELS};
use tpwatch_position::{MonitorConfig, RiskLevels, RiskProfile, MIN_INTERVAL};

use crate::error::{AppError, AppResult};

/// Environment variable consulted when `[line].access_token` is not set.
pub const LINE_TOKEN_ENV: &str = "LINE_CHANNEL_ACCESS_TOKEN";

/// Monitoring loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    /// Seconds between background update passes (minimum 10).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Deadline for one symbol's price lookup.
    #[serde(default = "default_price_timeout_ms")]
    pub price_timeout_ms: u64,
}

fn default_interval_secs() -> u64 {
    30
}

fn default_price_timeout_ms() -> u64 {
    5000
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            price_timeout_ms: default_price_timeout_ms(),
        }
    }
}

impl MonitorSection {
    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_secs(self.interval_secs),
            price_timeout: Duration::from_millis(self.price_timeout_ms),
        }
    }
}

/// Price feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Ticker API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Freshness window of the price cache.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// HTTP request timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://api.binance.com/api/v3".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    30
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// LINE notifier credentials. Both must resolve for the notifier to run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineConfig {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl LineConfig {
    /// Token from config, else from `LINE_CHANNEL_ACCESS_TOKEN`.
    pub fn resolved_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .or_else(|| std::env::var(LINE_TOKEN_ENV).ok())
            .filter(|t| !t.trim().is_empty())
    }

    /// `(token, user_id)` when the notifier can be enabled.
    pub fn credentials(&self) -> Option<(String, String)> {
        let user_id = self.user_id.clone().filter(|u| !u.trim().is_empty())?;
        Some((self.resolved_token()?, user_id))
    }
}

/// Position opened at startup (e.g., carried over from a previous session).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEntry {
    pub symbol: String,
    pub timeframe: String,
    pub direction: Direction,
    pub entry_price: Price,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub feed: FeedConfig,
    /// Per-timeframe TP/SL percentages.
    #[serde(default)]
    pub risk: RiskProfile,
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub watch: Vec<WatchEntry>,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.monitor.interval_secs < MIN_INTERVAL.as_secs() {
            return Err(AppError::Config(format!(
                "monitor.interval_secs must be at least {}, got {}",
                MIN_INTERVAL.as_secs(),
                self.monitor.interval_secs
            )));
        }
        if self.monitor.price_timeout_ms == 0 {
            return Err(AppError::Config(
                "monitor.price_timeout_ms must be positive".to_string(),
            ));
        }
        if self.feed.request_timeout_ms == 0 {
            return Err(AppError::Config(
                "feed.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.feed.base_url.trim().is_empty() {
            return Err(AppError::Config("feed.base_url is empty".to_string()));
        }

        for timeframe in self.risk.timeframes() {
            validate_levels(timeframe, &self.risk.levels_for(timeframe))?;
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.feed.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.feed.request_timeout_ms)
    }
}

fn validate_levels(timeframe: &str, levels: &RiskLevels) -> AppResult<()> {
    let invalid = |msg: String| Err(AppError::Config(format!("risk.{timeframe}: {msg}")));

    let count = levels.tp_levels_pct.len();
    if count == 0 || count > MAX_TP_LEVELS {
        return invalid(format!(
            "expected 1..={MAX_TP_LEVELS} tp_levels_pct, got {count}"
        ));
    }
    if levels.sl_pct <= Decimal::ZERO || levels.sl_pct >= Decimal::ONE_HUNDRED {
        return invalid(format!("sl_pct must be in (0, 100), got {}", levels.sl_pct));
    }

    let mut previous = Decimal::ZERO;
    for pct in &levels.tp_levels_pct {
        if *pct <= previous {
            return invalid(format!(
                "tp_levels_pct must be positive and strictly increasing: {:?}",
                levels
                    .tp_levels_pct
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
            ));
        }
        if *pct >= Decimal::ONE_HUNDRED {
            return invalid(format!("tp_levels_pct must be below 100, got {pct}"));
        }
        previous = *pct;
    }
    Ok(())
}
