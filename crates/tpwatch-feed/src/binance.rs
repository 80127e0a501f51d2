//! REST ticker price source.
//!
//! Fetches last-trade prices from a Binance-compatible `/ticker/price`
//! endpoint (`GET {base_url}/ticker/price?symbol=BTCUSDT`).

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use tpwatch_core::Price;

use crate::error::{FeedError, FeedResult};
use crate::source::{BoxFuture, PriceSource};

/// Default timeout for ticker requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error code returned for unknown symbols (`{"code":-1121,"msg":"Invalid symbol."}`).
const INVALID_SYMBOL_CODE: &str = "-1121";

/// Raw ticker response.
#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

/// Ticker client.
pub struct BinanceTickerSource {
    client: Client,
    base_url: String,
}

impl BinanceTickerSource {
    /// Create a new ticker source.
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g., "https://api.binance.com/api/v3")
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, symbol: &str) -> FeedResult<Price> {
        let url = format!("{}/ticker/price", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FeedError::Timeout {
                        symbol: symbol.to_string(),
                    }
                } else {
                    FeedError::Http(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains(INVALID_SYMBOL_CODE) {
                return Err(FeedError::SymbolNotFound(symbol.to_string()));
            }
            return Err(FeedError::Http(format!("HTTP {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Http(format!("Failed to read response: {e}")))?;

        let price = parse_ticker(symbol, &body)?;
        debug!(symbol, %price, "Fetched ticker price");
        Ok(price)
    }
}

/// Parse and sanity-check a ticker body.
///
/// Zero, negative and unparsable prices are rejected.
fn parse_ticker(symbol: &str, body: &str) -> FeedResult<Price> {
    let ticker: TickerPrice = serde_json::from_str(body)?;
    if !ticker.symbol.eq_ignore_ascii_case(symbol) {
        return Err(FeedError::Parse(format!(
            "ticker symbol mismatch: requested {symbol}, got {}",
            ticker.symbol
        )));
    }

    let price: Price = ticker.price.parse().map_err(|_| FeedError::InvalidPrice {
        symbol: symbol.to_string(),
        price: ticker.price.clone(),
    })?;

    if !price.is_positive() {
        return Err(FeedError::InvalidPrice {
            symbol: symbol.to_string(),
            price: ticker.price,
        });
    }

    Ok(price)
}

impl PriceSource for BinanceTickerSource {
    fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, FeedResult<Price>> {
        Box::pin(self.fetch(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_ticker_ok() {
        let body = r#"{"symbol":"BTCUSDT","price":"64250.10000000"}"#;
        let price = parse_ticker("BTCUSDT", body).unwrap();
        assert_eq!(price, Price::new(dec!(64250.10000000)));
    }

    #[test]
    fn test_parse_ticker_rejects_zero_and_negative() {
        let zero = r#"{"symbol":"BTCUSDT","price":"0.00000000"}"#;
        assert!(matches!(
            parse_ticker("BTCUSDT", zero),
            Err(FeedError::InvalidPrice { .. })
        ));

        let negative = r#"{"symbol":"BTCUSDT","price":"-1"}"#;
        assert!(parse_ticker("BTCUSDT", negative).is_err());
    }

    #[test]
    fn test_parse_ticker_rejects_garbage() {
        assert!(matches!(
            parse_ticker("BTCUSDT", r#"{"symbol":"BTCUSDT","price":"abc"}"#),
            Err(FeedError::InvalidPrice { .. })
        ));
        assert!(matches!(
            parse_ticker("BTCUSDT", "<html>"),
            Err(FeedError::Json(_))
        ));
    }

    #[test]
    fn test_parse_ticker_symbol_mismatch() {
        let body = r#"{"symbol":"ETHUSDT","price":"3000"}"#;
        assert!(matches!(
            parse_ticker("BTCUSDT", body),
            Err(FeedError::Parse(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let source =
            BinanceTickerSource::new("https://api.binance.com/api/v3/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(source.base_url, "https://api.binance.com/api/v3");
    }
}
