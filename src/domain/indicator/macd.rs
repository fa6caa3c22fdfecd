//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: undefined until slow + signal bars exist, so the first defined
//! index is slow + signal - 1.

use super::ema::ema_values;
use super::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[Bar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    let mut series = IndicatorSeries::undefined(indicator_type, bars.len());
    if bars.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return series;
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = ema_values(&closes, fast);
    let ema_slow = ema_values(&closes, slow);

    let line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let Some(line_start) = line.iter().position(Option::is_some) else {
        return series;
    };
    let defined_line: Vec<f64> = line[line_start..].iter().flatten().copied().collect();
    let signal_line = ema_values(&defined_line, signal_period);

    for (offset, signal) in signal_line.into_iter().enumerate().skip(signal_period) {
        let Some(signal) = signal else { continue };
        let macd = defined_line[offset];
        series.values[line_start + offset] = Some(IndicatorValue::Macd {
            line: macd,
            signal,
            histogram: macd - signal,
        });
    }

    series
}
