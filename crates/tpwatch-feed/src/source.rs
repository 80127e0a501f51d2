//! Price source trait.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tpwatch_core::Price;

use crate::cache::CacheStats;
use crate::error::FeedResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Pull-based source of current prices.
///
/// Implementations may serve a cached value within a bounded freshness
/// window. An `Err` of any kind means the price is unavailable for now.
pub trait PriceSource: Send + Sync {
    /// Get the current price for a symbol.
    fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, FeedResult<Price>>;

    /// A price already held locally and still fresh. Never fetches.
    fn cached_price(&self, _symbol: &str) -> Option<Price> {
        None
    }

    /// Cache hit/miss counters, if this source caches.
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

impl<S: PriceSource + ?Sized> PriceSource for Arc<S> {
    fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, FeedResult<Price>> {
        (**self).get_price(symbol)
    }

    fn cached_price(&self, symbol: &str) -> Option<Price> {
        (**self).cached_price(symbol)
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        (**self).cache_stats()
    }
}
