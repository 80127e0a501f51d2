//! Precision-safe decimal price type.
//!
//! Uses `rust_decimal` for exact decimal arithmetic so that threshold
//! comparisons (`price >= take_profit`) never suffer floating-point drift.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Mul, Sub};
use std::str::FromStr;

use crate::error::CoreError;
use crate::lifecycle::Direction;

/// Decimal places kept for derived percentages (P&L, win rate).
const PCT_DP: u32 = 4;

/// Price with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Scale by `1 + pct / 100`, rounded to 8 decimal places.
    #[inline]
    pub fn offset_pct(&self, pct: Decimal) -> Self {
        let factor = Decimal::ONE + pct / Decimal::ONE_HUNDRED;
        Self((*self * factor).0.round_dp(8))
    }

    /// Calculate percentage difference from another price.
    #[inline]
    pub fn pct_from(&self, other: Price) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        Some((*self - other).0 / other.0 * Decimal::ONE_HUNDRED)
    }
}

/// Percentage P&L of a move from `entry` to `exit` in the given direction.
///
/// LONG gains when price rises, SHORT gains when price falls. Returns zero
/// for a zero entry price.
#[must_use]
pub fn pnl_pct(direction: Direction, entry: Price, exit: Price) -> Decimal {
    if entry.is_zero() {
        return Decimal::ZERO;
    }
    let move_abs = match direction {
        Direction::Long => (exit - entry).inner(),
        Direction::Short => (entry - exit).inner(),
    };
    (move_abs / entry.inner() * Decimal::ONE_HUNDRED).round_dp(PCT_DP)
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}
