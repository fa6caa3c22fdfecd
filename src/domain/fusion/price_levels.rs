//! Entry band, stop loss and take-profit levels for a fused direction.

use super::{FusionConfig, RiskConfig};
use crate::domain::indicator::{IndicatorFrame, IndicatorValue};
use crate::domain::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevels {
    pub entry_low: f64,
    pub entry_high: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
}

impl PriceLevels {
    pub fn flat(close: f64) -> Self {
        PriceLevels {
            entry_low: close,
            entry_high: close,
            stop_loss: close,
            take_profit_1: close,
            take_profit_2: close,
        }
    }
}

/// Levels for `direction` at `index`. NEUTRAL yields [`PriceLevels::flat`].
pub fn compute_levels(
    frame: &IndicatorFrame<'_>,
    index: usize,
    direction: Direction,
    config: &FusionConfig,
) -> PriceLevels {
    let Some(bar) = frame.bar(index) else {
        return PriceLevels::flat(0.0);
    };
    let close = bar.close;
    if direction == Direction::Neutral {
        return PriceLevels::flat(close);
    }

    let atr = frame.atr(index).unwrap_or(0.0);
    let spread = config.entry_atr_mult * atr;
    let entry_low = close - spread;
    let entry_high = close + spread;

    let candidates = stop_candidates(frame, index, direction);
    let stop_loss = select_stop(
        close,
        entry_low,
        entry_high,
        atr,
        direction,
        &candidates,
        config,
    );

    let risk = (close - stop_loss).abs();
    let RiskConfig {
        take_profit_1_rr,
        take_profit_2_rr,
        ..
    } = config.risk;
    let (take_profit_1, take_profit_2) = match direction {
        Direction::Buy => (
            entry_high + take_profit_1_rr * risk,
            entry_high + take_profit_2_rr * risk,
        ),
        _ => (
            entry_low - take_profit_1_rr * risk,
            entry_low - take_profit_2_rr * risk,
        ),
    };

    PriceLevels {
        entry_low,
        entry_high,
        stop_loss,
        take_profit_1,
        take_profit_2,
    }
}

/// Structural levels on the protective side of the trade.
fn stop_candidates(frame: &IndicatorFrame<'_>, index: usize, direction: Direction) -> Vec<f64> {
    let mut out = Vec::new();
    if let Some(fib) = frame.fibonacci(index) {
        out.extend(fib.levels);
        out.push(match direction {
            Direction::Buy => fib.swing_low,
            _ => fib.swing_high,
        });
    }
    if let Some(IndicatorValue::Bollinger {
        upper,
        middle,
        lower,
        ..
    }) = frame.bollinger(index)
    {
        out.push(*middle);
        out.push(match direction {
            Direction::Buy => *lower,
            _ => *upper,
        });
    }
    let sr = frame.support_resistance(index);
    match direction {
        Direction::Buy => out.extend(sr.support),
        _ => out.extend(sr.resistance),
    }
    out
}

fn select_stop(
    close: f64,
    entry_low: f64,
    entry_high: f64,
    atr: f64,
    direction: Direction,
    candidates: &[f64],
    config: &FusionConfig,
) -> f64 {
    let floor = config.risk.stop_loss_floor_pct / 100.0;
    let fallback_distance = (config.fallback_stop_atr_mult * atr).max(close * floor);

    match direction {
        Direction::Buy => {
            let limit = close * (1.0 - floor);
            candidates
                .iter()
                .copied()
                .filter(|c| c.is_finite() && *c > 0.0 && *c < entry_low && *c <= limit)
                .max_by(f64::total_cmp)
                .unwrap_or(close - fallback_distance)
        }
        _ => {
            let limit = close * (1.0 + floor);
            candidates
                .iter()
                .copied()
                .filter(|c| c.is_finite() && *c > entry_high && *c >= limit)
                .min_by(f64::total_cmp)
                .unwrap_or(close + fallback_distance)
        }
    }
}
