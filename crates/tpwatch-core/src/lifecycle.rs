//! Position lifecycle enums.
//!
//! Direction, take-profit level, status and close reason shared by the
//! store, the evaluator and the outbound sinks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::decimal::Price;
use crate::error::CoreError;

/// Maximum number of take-profit levels per position.
pub const MAX_TP_LEVELS: usize = 3;

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// True when `price` has reached `target` moving in the favorable direction.
    ///
    /// LONG: `price >= target`. SHORT: `price <= target`.
    #[inline]
    pub fn reached_favorable(&self, price: Price, target: Price) -> bool {
        match self {
            Self::Long => price >= target,
            Self::Short => price <= target,
        }
    }

    /// True when `price` has reached `target` moving against the position.
    ///
    /// LONG: `price <= target`. SHORT: `price >= target`.
    #[inline]
    pub fn reached_adverse(&self, price: Price, target: Price) -> bool {
        match self {
            Self::Long => price <= target,
            Self::Short => price >= target,
        }
    }

    /// True when `a` is strictly more favorable than `b`.
    #[inline]
    pub fn is_beyond(&self, a: Price, b: Price) -> bool {
        match self {
            Self::Long => a > b,
            Self::Short => a < b,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" | "BUY" => Ok(Self::Long),
            "SHORT" | "SELL" => Ok(Self::Short),
            other => Err(CoreError::InvalidDirection(other.to_string())),
        }
    }
}

/// Take-profit level (TP1 is closest to entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TpLevel {
    #[serde(rename = "TP1")]
    Tp1,
    #[serde(rename = "TP2")]
    Tp2,
    #[serde(rename = "TP3")]
    Tp3,
}

impl TpLevel {
    pub const ALL: [TpLevel; MAX_TP_LEVELS] = [Self::Tp1, Self::Tp2, Self::Tp3];

    /// Zero-based index into `take_profits`/`hit_flags`.
    #[inline]
    pub fn index(&self) -> usize {
        match self {
            Self::Tp1 => 0,
            Self::Tp2 => 1,
            Self::Tp3 => 2,
        }
    }

    pub fn from_index(index: usize) -> Result<Self, CoreError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(CoreError::InvalidTpLevel(index))
    }
}

impl fmt::Display for TpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TP{}", self.index() + 1)
    }
}

/// Position status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    StopLoss,
    FinalTakeProfit,
    Manual,
    Other,
}

impl CloseReason {
    /// Label used for metrics and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::FinalTakeProfit => "final_take_profit",
            Self::Manual => "manual",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopLoss => write!(f, "STOP_LOSS"),
            Self::FinalTakeProfit => write!(f, "FINAL_TAKE_PROFIT"),
            Self::Manual => write!(f, "MANUAL"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}
