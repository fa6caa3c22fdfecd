//! Fibonacci retracement levels over a trailing swing.
//!
//! The swing is the highest high and lowest low of the last `lookback` bars.
//! If the high came after the low the swing is an uptrend and levels are
//! measured down from the high (potential supports); otherwise it is a
//! downtrend and levels are measured up from the low (potential
//! resistances). Ties resolve to the most recent bar.
//!
//! Warmup: first (lookback-1) bars are undefined.

use super::rolling::{Extreme, RollingExtreme};
use super::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub const FIB_RATIOS: [f64; 5] = [0.236, 0.382, 0.5, 0.618, 0.786];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingTrend {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FibonacciLevels {
    pub swing_high: f64,
    pub swing_low: f64,
    pub high_index: usize,
    pub low_index: usize,
    pub trend: SwingTrend,
    /// One level per entry of [`FIB_RATIOS`], in the same order.
    pub levels: [f64; 5],
}

impl FibonacciLevels {
    pub fn from_swing(high: (usize, f64), low: (usize, f64)) -> Self {
        let (high_index, swing_high) = high;
        let (low_index, swing_low) = low;
        let range = swing_high - swing_low;
        let trend = if high_index >= low_index {
            SwingTrend::Up
        } else {
            SwingTrend::Down
        };
        let levels = FIB_RATIOS.map(|r| match trend {
            SwingTrend::Up => swing_high - r * range,
            SwingTrend::Down => swing_low + r * range,
        });
        Self {
            swing_high,
            swing_low,
            high_index,
            low_index,
            trend,
            levels,
        }
    }

    pub fn range(&self) -> f64 {
        self.swing_high - self.swing_low
    }

    /// (ratio, level) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        FIB_RATIOS.iter().copied().zip(self.levels.iter().copied())
    }
}

pub fn calculate_fibonacci(bars: &[Bar], lookback: usize) -> IndicatorSeries {
    let mut series = IndicatorSeries::undefined(IndicatorType::Fibonacci(lookback), bars.len());
    if lookback == 0 {
        return series;
    }

    let mut highs = RollingExtreme::new(lookback, Extreme::Max);
    let mut lows = RollingExtreme::new(lookback, Extreme::Min);

    for (i, bar) in bars.iter().enumerate() {
        highs.push(i, bar.high);
        lows.push(i, bar.low);
        if i + 1 < lookback {
            continue;
        }
        if let (Some(high), Some(low)) = (highs.current(), lows.current()) {
            series.values[i] = Some(IndicatorValue::Fibonacci(FibonacciLevels::from_swing(
                high, low,
            )));
        }
    }
    series
}
