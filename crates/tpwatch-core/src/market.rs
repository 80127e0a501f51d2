//! Position identity types.
//!
//! A position is identified two ways: by its store-assigned `PositionId`,
//! and by its `NaturalKey` (symbol + timeframe) of which at most one may be
//! OPEN at any time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Natural key of a position: the instrument and the signal timeframe.
///
/// Symbols are normalized to uppercase (e.g., "btcusdt" -> "BTCUSDT").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    pub symbol: String,
    pub timeframe: String,
}

impl NaturalKey {
    pub fn new(symbol: impl AsRef<str>, timeframe: impl AsRef<str>) -> Self {
        Self {
            symbol: symbol.as_ref().trim().to_ascii_uppercase(),
            timeframe: timeframe.as_ref().trim().to_string(),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.timeframe)
    }
}

/// Store-assigned position identifier.
///
/// Format: `{symbol}-{timeframe}-{seq:06}` (e.g., "BTCUSDT-1h-000042").
/// The sequence is store-wide, so re-opening a natural key after a close
/// always yields a fresh id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(String);

impl PositionId {
    /// Build an id from a natural key and a store sequence number.
    pub fn new(key: &NaturalKey, seq: u64) -> Self {
        Self(format!("{}-{}-{:06}", key.symbol, key.timeframe, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PositionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PositionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_key_normalizes_symbol() {
        let key = NaturalKey::new(" btcusdt ", "1h");
        assert_eq!(key.symbol, "BTCUSDT");
        assert_eq!(key.to_string(), "BTCUSDT/1h");
        assert_eq!(key, NaturalKey::new("BTCUSDT", "1h"));
    }

    #[test]
    fn test_position_id_format() {
        let key = NaturalKey::new("ETHUSDT", "4h");
        let id = PositionId::new(&key, 42);
        assert_eq!(id.as_str(), "ETHUSDT-4h-000042");
        assert_eq!(PositionId::from("ETHUSDT-4h-000042"), id);
    }
}
