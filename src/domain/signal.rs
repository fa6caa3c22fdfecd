//! Directional trade recommendation produced by the fusion engine.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Confidence at or above which a signal is labelled strong.
pub const STRONG_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
    Neutral,
}

impl Direction {
    /// +1 for BUY, -1 for SELL, 0 for NEUTRAL.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
            Direction::Neutral => Direction::Neutral,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalStrength {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignalStrength::StrongBuy => "STRONG BUY",
            SignalStrength::Buy => "BUY",
            SignalStrength::Hold => "HOLD",
            SignalStrength::Sell => "SELL",
            SignalStrength::StrongSell => "STRONG SELL",
        };
        write!(f, "{}", label)
    }
}

/// Fused recommendation for one bar. Immutable once built.
///
/// For BUY: `stop_loss < entry_low <= entry_high < take_profit_1 <= take_profit_2`.
/// SELL mirrors the ordering; NEUTRAL carries every level at the close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub direction: Direction,
    pub confidence: f64,
    /// Weighted net vote in [-1, 1].
    pub score: f64,
    pub close: f64,
    pub entry_low: f64,
    pub entry_high: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub contributing_reasons: Vec<String>,
    pub index: usize,
    pub timestamp: NaiveDateTime,
}

impl Signal {
    /// A NEUTRAL signal with every level at `close`.
    pub fn neutral(index: usize, timestamp: NaiveDateTime, close: f64) -> Self {
        Signal {
            direction: Direction::Neutral,
            confidence: 0.0,
            score: 0.0,
            close,
            entry_low: close,
            entry_high: close,
            stop_loss: close,
            take_profit_1: close,
            take_profit_2: close,
            contributing_reasons: Vec::new(),
            index,
            timestamp,
        }
    }

    /// BUY or SELL with at least `min_confidence`.
    pub fn is_actionable(&self, min_confidence: f64) -> bool {
        self.direction != Direction::Neutral && self.confidence >= min_confidence
    }

    /// Distance from close to stop.
    pub fn risk(&self) -> f64 {
        (self.close - self.stop_loss).abs()
    }

    pub fn strength(&self) -> SignalStrength {
        let strong = self.confidence >= STRONG_CONFIDENCE;
        match (self.direction, strong) {
            (Direction::Buy, true) => SignalStrength::StrongBuy,
            (Direction::Buy, false) => SignalStrength::Buy,
            (Direction::Sell, true) => SignalStrength::StrongSell,
            (Direction::Sell, false) => SignalStrength::Sell,
            (Direction::Neutral, _) => SignalStrength::Hold,
        }
    }
}
