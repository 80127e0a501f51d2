//! Open specifications and risk-level derivation.
//!
//! A [`PositionSpec`] is what the signal detector hands to the lifecycle
//! API. It can be built explicitly, or derived from an entry price and the
//! per-timeframe percentages in a [`RiskProfile`].

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use tpwatch_core::{Direction, NaturalKey, Price, MAX_TP_LEVELS};

use crate::error::{PositionError, PositionResult};

/// Timeframe used when a signal's timeframe has no configured levels.
pub const FALLBACK_TIMEFRAME: &str = "4h";

/// Validated-on-open specification of a new position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSpec {
    pub key: NaturalKey,
    pub direction: Direction,
    pub entry_price: Price,
    pub stop_loss: Price,
    /// TP1..TPn, nearest first.
    pub take_profits: Vec<Price>,
}

impl PositionSpec {
    /// Derive TP/SL levels from an entry price and risk percentages.
    ///
    /// LONG: TPs at `entry * (1 + pct/100)`, SL at `entry * (1 - sl/100)`.
    /// SHORT mirrors both. Levels are rounded to 8 decimal places.
    #[must_use]
    pub fn from_signal(
        key: NaturalKey,
        direction: Direction,
        entry_price: Price,
        levels: &RiskLevels,
    ) -> Self {
        let (tp_sign, sl_sign) = match direction {
            Direction::Long => (Decimal::ONE, Decimal::NEGATIVE_ONE),
            Direction::Short => (Decimal::NEGATIVE_ONE, Decimal::ONE),
        };

        let take_profits = levels
            .tp_levels_pct
            .iter()
            .map(|pct| entry_price.offset_pct(*pct * tp_sign))
            .collect();
        let stop_loss = entry_price.offset_pct(levels.sl_pct * sl_sign);

        Self {
            key,
            direction,
            entry_price,
            stop_loss,
            take_profits,
        }
    }

    /// Check that every threshold is positive and that the levels are
    /// strictly ordered in the position's favorable direction:
    /// `SL < entry < TP1 < TP2 < TP3` for LONG, reversed for SHORT.
    pub fn validate(&self) -> PositionResult<()> {
        let invalid = |msg: String| Err(PositionError::InvalidSpec(msg));

        if self.key.symbol.is_empty() || self.key.timeframe.is_empty() {
            return invalid(format!("empty symbol or timeframe: {}", self.key));
        }
        if self.take_profits.is_empty() || self.take_profits.len() > MAX_TP_LEVELS {
            return invalid(format!(
                "expected 1..={MAX_TP_LEVELS} take-profit levels, got {}",
                self.take_profits.len()
            ));
        }
        if !self.entry_price.is_positive() || !self.stop_loss.is_positive() {
            return invalid(format!(
                "entry {} and stop-loss {} must be positive",
                self.entry_price, self.stop_loss
            ));
        }
        if !self.direction.is_beyond(self.entry_price, self.stop_loss) {
            return invalid(format!(
                "{} stop-loss {} is not on the adverse side of entry {}",
                self.direction, self.stop_loss, self.entry_price
            ));
        }

        let mut previous = self.entry_price;
        for (i, tp) in self.take_profits.iter().enumerate() {
            if !tp.is_positive() {
                return invalid(format!("TP{} {} must be positive", i + 1, tp));
            }
            if !self.direction.is_beyond(*tp, previous) {
                return invalid(format!(
                    "{} TP{} {} is not beyond {}",
                    self.direction,
                    i + 1,
                    tp,
                    previous
                ));
            }
            previous = *tp;
        }

        Ok(())
    }
}

/// Take-profit and stop-loss distances for one timeframe, in percent of entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub tp_levels_pct: Vec<Decimal>,
    pub sl_pct: Decimal,
}

impl RiskLevels {
    pub fn new(tp_levels_pct: Vec<Decimal>, sl_pct: Decimal) -> Self {
        Self {
            tp_levels_pct,
            sl_pct,
        }
    }
}

/// Per-timeframe risk levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskProfile {
    levels: BTreeMap<String, RiskLevels>,
}

impl RiskProfile {
    pub fn new(levels: BTreeMap<String, RiskLevels>) -> Self {
        Self { levels }
    }

    /// Levels for a timeframe, falling back to the 4h levels, then to the
    /// built-in 4h defaults.
    pub fn levels_for(&self, timeframe: &str) -> RiskLevels {
        self.levels
            .get(timeframe)
            .or_else(|| self.levels.get(FALLBACK_TIMEFRAME))
            .cloned()
            .unwrap_or_else(default_4h)
    }

    pub fn timeframes(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(String::as_str)
    }
}

fn default_4h() -> RiskLevels {
    RiskLevels::new(vec![dec!(3.0), dec!(5.0), dec!(7.0)], dec!(3.0))
}

impl Default for RiskProfile {
    fn default() -> Self {
        let mut levels = BTreeMap::new();
        levels.insert(
            "1h".to_string(),
            RiskLevels::new(vec![dec!(2.0), dec!(3.5), dec!(5.0)], dec!(2.0)),
        );
        levels.insert(FALLBACK_TIMEFRAME.to_string(), default_4h());
        levels.insert(
            "1d".to_string(),
            RiskLevels::new(vec![dec!(5.0), dec!(8.0), dec!(12.0)], dec!(4.0)),
        );
        Self { levels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(d: Decimal) -> Price {
        Price::new(d)
    }

    fn long_spec(tps: Vec<Decimal>) -> PositionSpec {
        PositionSpec {
            key: NaturalKey::new("BTCUSDT", "1h"),
            direction: Direction::Long,
            entry_price: p(dec!(100)),
            stop_loss: p(dec!(95)),
            take_profits: tps.into_iter().map(p).collect(),
        }
    }

    #[test]
    fn test_valid_long_and_short() {
        assert!(long_spec(vec![dec!(110), dec!(120), dec!(130)])
            .validate()
            .is_ok());

        let short = PositionSpec {
            key: NaturalKey::new("ETHUSDT", "4h"),
            direction: Direction::Short,
            entry_price: p(dec!(100)),
            stop_loss: p(dec!(105)),
            take_profits: vec![p(dec!(90))],
        };
        assert!(short.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_monotonic_take_profits() {
        let err = long_spec(vec![dec!(110), dec!(105), dec!(130)])
            .validate()
            .unwrap_err();
        assert!(matches!(err, PositionError::InvalidSpec(_)));

        // Equal levels are not strictly beyond.
        assert!(long_spec(vec![dec!(110), dec!(110)]).validate().is_err());

        // TP1 on the wrong side of entry.
        assert!(long_spec(vec![dec!(99)]).validate().is_err());
    }

    #[test]
    fn test_rejects_stop_loss_on_favorable_side() {
        let mut spec = long_spec(vec![dec!(110)]);
        spec.stop_loss = p(dec!(101));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_rejects_level_count_and_non_positive() {
        assert!(long_spec(vec![]).validate().is_err());
        assert!(long_spec(vec![dec!(110), dec!(120), dec!(130), dec!(140)])
            .validate()
            .is_err());

        let mut spec = long_spec(vec![dec!(110)]);
        spec.stop_loss = Price::ZERO;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_short_take_profit() {
        let short = PositionSpec {
            key: NaturalKey::new("ETHUSDT", "4h"),
            direction: Direction::Short,
            entry_price: p(dec!(100)),
            stop_loss: p(dec!(105)),
            take_profits: vec![p(dec!(90)), p(dec!(-20))],
        };
        assert!(matches!(
            short.validate(),
            Err(PositionError::InvalidSpec(_))
        ));

        // A SHORT derived from a 100% or wider distance lands at or below zero.
        let derived = PositionSpec::from_signal(
            NaturalKey::new("ETHUSDT", "4h"),
            Direction::Short,
            p(dec!(100)),
            &RiskLevels::new(vec![dec!(50), dec!(100)], dec!(5)),
        );
        assert_eq!(derived.take_profits[1], Price::ZERO);
        assert!(derived.validate().is_err());
    }

    #[test]
    fn test_from_signal_long() {
        let profile = RiskProfile::default();
        let spec = PositionSpec::from_signal(
            NaturalKey::new("BTCUSDT", "1h"),
            Direction::Long,
            p(dec!(100)),
            &profile.levels_for("1h"),
        );

        assert_eq!(
            spec.take_profits,
            vec![p(dec!(102)), p(dec!(103.5)), p(dec!(105))]
        );
        assert_eq!(spec.stop_loss, p(dec!(98)));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_from_signal_short_mirrors_levels() {
        let profile = RiskProfile::default();
        let spec = PositionSpec::from_signal(
            NaturalKey::new("ETHUSDT", "1d"),
            Direction::Short,
            p(dec!(200)),
            &profile.levels_for("1d"),
        );

        assert_eq!(
            spec.take_profits,
            vec![p(dec!(190)), p(dec!(184)), p(dec!(176))]
        );
        assert_eq!(spec.stop_loss, p(dec!(208)));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_unknown_timeframe_falls_back_to_4h() {
        let profile = RiskProfile::default();
        assert_eq!(profile.levels_for("15m"), default_4h());

        let empty = RiskProfile::new(BTreeMap::new());
        assert_eq!(empty.levels_for("1h"), default_4h());
    }
}
