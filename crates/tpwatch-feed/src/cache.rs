//! Freshness-window price cache.
//!
//! Wraps any [`PriceSource`] and serves a previously fetched price while it
//! is younger than the configured TTL. Misses and expired entries fall
//! through to the inner source; failed fetches are never cached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::trace;

use tpwatch_core::Price;

use crate::error::FeedResult;
use crate::source::{BoxFuture, PriceSource};

/// Default freshness window: 30 seconds.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Cached price entry.
#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: Price,
    fetched_at: Instant,
}

/// Cache introspection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub ttl_secs: u64,
}

impl CacheStats {
    /// Hit rate in percent (0 when nothing was requested yet).
    pub fn hit_rate_pct(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

/// Price source decorator with a per-symbol freshness window.
pub struct CachedPriceSource<S> {
    inner: S,
    ttl: Duration,
    entries: DashMap<String, CachedPrice>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: PriceSource> CachedPriceSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return a fresh cached price, if any.
    fn fresh(&self, symbol: &str) -> Option<Price> {
        self.entries
            .get(symbol)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.price)
    }

    /// Drop every cached entry. Counters are kept.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

impl<S: PriceSource> PriceSource for CachedPriceSource<S> {
    fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, FeedResult<Price>> {
        Box::pin(async move {
            if let Some(price) = self.fresh(symbol) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(symbol, %price, "Price cache hit");
                return Ok(price);
            }

            self.misses.fetch_add(1, Ordering::Relaxed);
            let price = self.inner.get_price(symbol).await?;
            self.entries.insert(
                symbol.to_string(),
                CachedPrice {
                    price,
                    fetched_at: Instant::now(),
                },
            );
            Ok(price)
        })
    }

    fn cached_price(&self, symbol: &str) -> Option<Price> {
        self.fresh(symbol)
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.stats())
    }
}
