//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - The change at bar 0 counts as zero, so the first average covers bars 0..period
//! - First average: simple mean of gains/losses over the first n bars
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100, or 50 when avg_gain is zero as well.
//!
//! Warmup: first (n-1) bars are undefined.

use super::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut series = IndicatorSeries::undefined(IndicatorType::Rsi(period), bars.len());
    if period == 0 || bars.len() < period {
        return series;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 0..bars.len() {
        let change = if i == 0 {
            0.0
        } else {
            bars[i].close - bars[i - 1].close
        };
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i < period {
            avg_gain += gain / period as f64;
            avg_loss += loss / period as f64;
            if i < period - 1 {
                continue;
            }
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        }

        series.values[i] = Some(IndicatorValue::Simple(rsi_from_averages(avg_gain, avg_loss)));
    }

    series
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        if avg_gain <= 0.0 { 50.0 } else { 100.0 }
    } else {
        (100.0 - (100.0 / (1.0 + avg_gain / avg_loss))).clamp(0.0, 100.0)
    }
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

    #[test]
    fn rsi_empty_bars() {
        let series = calculate_rsi(&[], 14);
        assert!(series.values.is_empty());
    }

    #[test]
    fn rsi_single_bar() {
        let series = calculate_rsi(&make_bars(&[100.0]), 14);
        assert_eq!(series.values.len(), 1);
        assert!(series.values[0].is_none());
    }

    #[test]
    fn rsi_warmup_period() {
        let prices: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let series = calculate_rsi(&make_bars(&prices), 14);

        assert_eq!(series.values.len(), 15);
        for i in 0..13 {
            assert!(series.values[i].is_none(), "Bar {} should be undefined", i);
        }
        assert!(series.values[13].is_some(), "Bar 13 should be defined");
        assert!(series.values[14].is_some());
    }

    #[test]
    fn rsi_all_gains_no_losses() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&make_bars(&prices), 14);
        assert_abs_diff_eq!(series.simple(14).unwrap(), 100.0);
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&make_bars(&prices), 14);
        assert_abs_diff_eq!(series.simple(14).unwrap(), 0.0);
    }

    #[test]
    fn rsi_flat_prices_is_neutral() {
        let series = calculate_rsi(&make_bars(&[100.0; 20]), 14);
        assert_abs_diff_eq!(series.simple(19).unwrap(), 50.0);
    }

    #[test]
    fn rsi_seed_includes_zero_first_change() {
        // period 3: changes [0, +2, -1] → avg_gain 2/3, avg_loss 1/3 → RS 2
        let series = calculate_rsi(&make_bars(&[10.0, 12.0, 11.0]), 3);
        assert_abs_diff_eq!(series.simple(2).unwrap(), 100.0 - 100.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn rsi_wilder_smoothing_step() {
        // seed as above, then change +3: gain (2/3*2+3)/3, loss (1/3*2)/3
        let series = calculate_rsi(&make_bars(&[10.0, 12.0, 11.0, 14.0]), 3);
        let avg_gain = (2.0 / 3.0 * 2.0 + 3.0) / 3.0;
        let avg_loss = (1.0 / 3.0 * 2.0) / 3.0;
        let expected = 100.0 - 100.0 / (1.0 + avg_gain / avg_loss);
        assert_abs_diff_eq!(series.simple(3).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn rsi_in_range() {
        let prices: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        let series = calculate_rsi(&make_bars(&prices), 14);
        for rsi in series.values.iter().flatten().filter_map(IndicatorValue::as_simple) {
            assert!((0.0..=100.0).contains(&rsi), "RSI {} out of range", rsi);
        }
    }

    #[test]
    fn rsi_zero_period() {
        let series = calculate_rsi(&make_bars(&[100.0, 101.0]), 0);
        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(Option::is_none));
    }

    #[test]
    fn rsi_indicator_type() {
        let series = calculate_rsi(&make_bars(&[100.0]), 14);
        assert_eq!(series.indicator_type, IndicatorType::Rsi(14));
    }
}
