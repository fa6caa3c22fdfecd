//! Volume relative to its trailing average.
//!
//! VOLUME_RATIO(n)[i] = V[i] / mean(V[i-n+1..=i]). Values above 1 mean
//! above-average participation. Undefined during warm-up and when the
//! average volume is zero.

use super::rolling::RollingWindow;
use super::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_volume_ratio(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut series = IndicatorSeries::undefined(IndicatorType::VolumeRatio(period), bars.len());
    if period == 0 {
        return series;
    }

    let mut window = RollingWindow::new(period);
    for (i, bar) in bars.iter().enumerate() {
        window.push(bar.volume);
        if !window.is_full() {
            continue;
        }
        if let Some(avg) = window.mean().filter(|avg| *avg > 0.0) {
            series.values[i] = Some(IndicatorValue::Simple(bar.volume / avg));
        }
    }
    series
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeProfile {
    pub average: f64,
    pub current: f64,
    pub ratio: f64,
    pub high_volume: bool,
}

/// Volume summary at `index` over the trailing `period` bars.
pub fn volume_profile(
    bars: &[Bar],
    index: usize,
    period: usize,
    spike_threshold: f64,
) -> Option<VolumeProfile> {
    if period == 0 || index >= bars.len() || index + 1 < period {
        return None;
    }
    let window = &bars[index + 1 - period..=index];
    let average = window.iter().map(|b| b.volume).sum::<f64>() / period as f64;
    if average <= 0.0 {
        return None;
    }
    let current = bars[index].volume;
    let ratio = current / average;
    Some(VolumeProfile {
        average,
        current,
        ratio,
        high_volume: ratio > spike_threshold,
    })
}
