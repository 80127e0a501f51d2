//! Price source boundary for tpwatch.
//!
//! The monitoring engine pulls quotes through the [`PriceSource`] trait.
//! This crate provides:
//! - [`BinanceTickerSource`]: REST ticker lookups
//! - [`CachedPriceSource`]: Freshness-window cache with hit/miss counters

pub mod binance;
pub mod cache;
pub mod error;
pub mod source;

pub use binance::BinanceTickerSource;
pub use cache::{CacheStats, CachedPriceSource, DEFAULT_CACHE_TTL};
pub use error::{FeedError, FeedResult};
pub use source::{BoxFuture, PriceSource};
