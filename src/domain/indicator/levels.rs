//! Swing support and resistance levels.
//!
//! Bar k is a swing low (high) when its low (high) is the extreme of bars
//! k-w..=k+w. A pivot only becomes visible once its right-hand side has
//! printed, so at index i only pivots with k + w <= i are considered.
//! The scan is limited to the trailing `lookback` bars.

use crate::domain::ohlcv::Bar;

const MAX_LEVELS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupportResistance {
    /// Nearest first, all below the reference close.
    pub support: Vec<f64>,
    /// Nearest first, all above the reference close.
    pub resistance: Vec<f64>,
}

pub fn support_resistance(
    bars: &[Bar],
    index: usize,
    window: usize,
    lookback: usize,
) -> SupportResistance {
    let mut out = SupportResistance::default();
    if window == 0 || index >= bars.len() || index < 2 * window {
        return out;
    }
    let close = bars[index].close;
    let visible = &bars[..=index];

    let mut supports = Vec::new();
    let mut resistances = Vec::new();
    let first = window.max(index.saturating_sub(lookback));
    for k in first..=(index - window) {
        let neighbourhood = &visible[k - window..=k + window];
        let low = visible[k].low;
        let high = visible[k].high;
        if low < close && neighbourhood.iter().all(|b| b.low >= low) {
            supports.push(low);
        }
        if high > close && neighbourhood.iter().all(|b| b.high <= high) {
            resistances.push(high);
        }
    }

    supports.sort_by(|a, b| b.total_cmp(a));
    supports.dedup();
    resistances.sort_by(f64::total_cmp);
    resistances.dedup();

    out.support = supports.into_iter().take(MAX_LEVELS).collect();
    out.resistance = resistances.into_iter().take(MAX_LEVELS).collect();
    out
}
