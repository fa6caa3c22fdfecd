//! Average True Range with Wilder smoothing.
//!
//! TR[0] = high - low, TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|).
//! Seed is the mean of the first n true ranges, then
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n.
//! Warmup: first (n-1) bars are undefined.

use super::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut series = IndicatorSeries::undefined(IndicatorType::Atr(period), bars.len());
    if period == 0 || bars.len() < period {
        return series;
    }

    let mut atr = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };

        if i < period {
            atr += tr / period as f64;
            if i < period - 1 {
                continue;
            }
        } else {
            atr = (atr * (period - 1) as f64 + tr) / period as f64;
        }
        series.values[i] = Some(IndicatorValue::Simple(atr));
    }

    series
}
