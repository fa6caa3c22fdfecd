//! OHLCV bar and bar series representation.
//!
//! A [`BarSeries`] is validated once, when it is built, and is read-only
//! afterwards. Everything downstream assumes the structural guarantees hold.

use chrono::NaiveDateTime;

use super::error::SeriesError;
use super::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    fn check(&self, index: usize) -> Result<(), SeriesError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(SeriesError::NonPositivePrice { index });
        }
        if self.high < self.open.max(self.close) || self.low > self.open.min(self.close) {
            return Err(SeriesError::InvertedRange { index });
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(SeriesError::NegativeVolume { index });
        }
        Ok(())
    }
}

/// Ordered bars for one symbol on one timeframe.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    symbol: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Validate and wrap a bar vector. Gaps are allowed, reordering is not.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (i, bar) in bars.iter().enumerate() {
            bar.check(i)?;
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(SeriesError::NonMonotonic { index: i });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn last(&self) -> &Bar {
        // Non-empty by construction.
        &self.bars[self.bars.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Copy of bars `0..=index`. Returns `None` when `index` is out of range.
    pub fn truncated(&self, index: usize) -> Option<BarSeries> {
        if index >= self.bars.len() {
            return None;
        }
        Some(BarSeries {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            bars: self.bars[..=index].to_vec(),
        })
    }
}
