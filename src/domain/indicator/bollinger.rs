//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (k × StdDev)
//! - Lower: Middle - (k × StdDev)
//! - Bandwidth: (Upper - Lower) / Middle
//!
//! StdDev is the sample standard deviation (divides by N-1).
//! A squeeze is flagged when bandwidth falls strictly below the configured
//! percentile of the previous `squeeze_lookback` bandwidths; until that much
//! history exists the flag stays false.
//!
//! Warmup: first (period-1) bars are undefined.

use super::rolling::RollingWindow;
use super::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerParams {
    pub period: usize,
    pub k: f64,
    pub squeeze_lookback: usize,
    pub squeeze_percentile: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        BollingerParams {
            period: 20,
            k: 2.0,
            squeeze_lookback: 120,
            squeeze_percentile: 0.2,
        }
    }
}

pub fn calculate_bollinger(bars: &[Bar], params: &BollingerParams) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period: params.period,
        stddev_mult_x100: (params.k * 100.0).round() as u32,
    };
    let mut series = IndicatorSeries::undefined(indicator_type, bars.len());
    if params.period < 2 {
        return series;
    }

    let mut window = RollingWindow::new(params.period);
    let mut history: VecDeque<f64> = VecDeque::with_capacity(params.squeeze_lookback + 1);

    for (i, bar) in bars.iter().enumerate() {
        window.push(bar.close);
        if !window.is_full() {
            continue;
        }
        let (Some(middle), Some(variance)) = (window.mean(), window.sample_variance()) else {
            continue;
        };

        let stddev = variance.sqrt();
        let upper = middle + params.k * stddev;
        let lower = middle - params.k * stddev;
        let bandwidth = if middle > 0.0 {
            (upper - lower) / middle
        } else {
            0.0
        };

        let squeeze = history.len() >= params.squeeze_lookback
            && params.squeeze_lookback > 0
            && bandwidth < percentile(history.iter().copied(), params.squeeze_percentile);

        history.push_back(bandwidth);
        if history.len() > params.squeeze_lookback {
            history.pop_front();
        }

        series.values[i] = Some(IndicatorValue::Bollinger {
            upper,
            middle,
            lower,
            bandwidth,
            squeeze,
        });
    }

    series
}

/// Linear-interpolated percentile (`p` in 0..=1) of the given values.
pub(crate) fn percentile(values: impl Iterator<Item = f64>, p: f64) -> f64 {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + chrono::Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn params(period: usize, k: f64) -> BollingerParams {
        BollingerParams {
            period,
            k,
            squeeze_lookback: 5,
            squeeze_percentile: 0.2,
        }
    }

    fn bands(value: &Option<IndicatorValue>) -> (f64, f64, f64, f64, bool) {
        match value {
            Some(IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
                bandwidth,
                squeeze,
            }) => (*upper, *middle, *lower, *bandwidth, *squeeze),
            other => panic!("Expected Bollinger value, got {:?}", other),
        }
    }

    #[test]
    fn bollinger_warmup() {
        let series = calculate_bollinger(&make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]), &params(3, 2.0));
        assert!(series.values[0].is_none());
        assert!(series.values[1].is_none());
        assert!(series.values[2].is_some());
        assert!(series.values[4].is_some());
    }

    #[test]
    fn bollinger_constant_values() {
        let series = calculate_bollinger(&make_bars(&[100.0; 5]), &params(3, 2.0));
        let (upper, middle, lower, bandwidth, _) = bands(&series.values[2]);
        assert_abs_diff_eq!(middle, 100.0);
        assert_abs_diff_eq!(upper, 100.0);
        assert_abs_diff_eq!(lower, 100.0);
        assert_abs_diff_eq!(bandwidth, 0.0);
    }

    #[test]
    fn bollinger_basic_calculation() {
        let series = calculate_bollinger(&make_bars(&[10.0, 20.0, 30.0]), &params(3, 2.0));
        let (upper, middle, lower, bandwidth, _) = bands(&series.values[2]);

        // sample variance: (100 + 0 + 100) / 2 = 100
        let stddev = 10.0;
        assert_abs_diff_eq!(middle, 20.0, epsilon = 1e-10);
        assert_abs_diff_eq!(upper, 20.0 + 2.0 * stddev, epsilon = 1e-10);
        assert_abs_diff_eq!(lower, 20.0 - 2.0 * stddev, epsilon = 1e-10);
        assert_abs_diff_eq!(bandwidth, 40.0 / 20.0, epsilon = 1e-10);
    }

    #[test]
    fn bollinger_symmetry_and_order() {
        let prices: Vec<f64> = (0..30).map(|i| 50.0 + (i as f64).sin() * 3.0).collect();
        let series = calculate_bollinger(&make_bars(&prices), &params(5, 2.0));
        for value in series.values.iter().filter(|v| v.is_some()) {
            let (upper, middle, lower, _, _) = bands(value);
            assert!(upper >= middle && middle >= lower);
            assert_abs_diff_eq!(upper - middle, middle - lower, epsilon = 1e-9);
        }
    }

    #[test]
    fn squeeze_flags_contraction_after_lookback() {
        // wide swings, then a tight range
        let mut prices: Vec<f64> = (0..12)
            .map(|i| if i % 2 == 0 { 90.0 } else { 110.0 })
            .collect();
        prices.extend([100.0, 100.1, 100.0, 100.1]);
        let series = calculate_bollinger(&make_bars(&prices), &params(3, 2.0));

        // bars 2..=6 fill the lookback; none of them can be a squeeze
        for i in 2..=6 {
            assert!(!bands(&series.values[i]).4, "bar {} flagged too early", i);
        }
        let (_, _, _, _, squeeze) = bands(&series.values[15]);
        assert!(squeeze);
        let (_, _, _, _, squeeze) = bands(&series.values[10]);
        assert!(!squeeze);
    }

    #[test]
    fn bollinger_indicator_type() {
        let series = calculate_bollinger(&make_bars(&[10.0, 20.0, 30.0]), &params(20, 2.0));
        assert_eq!(
            series.indicator_type,
            IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 200
            }
        );
    }

    #[test]
    fn percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_abs_diff_eq!(percentile(values.iter().copied(), 0.0), 1.0);
        assert_abs_diff_eq!(percentile(values.iter().copied(), 1.0), 4.0);
        assert_abs_diff_eq!(percentile(values.iter().copied(), 0.5), 2.5);
    }
}
