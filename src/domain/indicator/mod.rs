//! Technical indicator implementations.
//!
//! Every calculator takes the full bar slice and returns one value per bar,
//! where `None` marks warm-up bars that do not have enough history yet.
//! Values at index `i` only ever read bars `0..=i`, so computing on a
//! truncated series yields the same prefix.
//!
//! - `IndicatorValue`: enum for the different indicator output shapes
//! - `IndicatorType`: indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: a time series of optional indicator values
//! - `IndicatorFrame`: all configured series for one bar series

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod fibonacci;
pub mod levels;
pub mod macd;
pub mod rolling;
pub mod rsi;
pub mod volume;

pub use atr::calculate_atr;
pub use bollinger::{calculate_bollinger, BollingerParams};
pub use fibonacci::{calculate_fibonacci, FibonacciLevels, SwingTrend, FIB_RATIOS};
pub use levels::{support_resistance, SupportResistance};
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use volume::{calculate_volume_ratio, volume_profile, VolumeProfile};

use crate::domain::error::OrderPointError;
use crate::domain::ohlcv::{Bar, BarSeries};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
        bandwidth: f64,
        squeeze: bool,
    },
    Fibonacci(FibonacciLevels),
}

impl IndicatorValue {
    pub fn as_simple(&self) -> Option<f64> {
        match self {
            IndicatorValue::Simple(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Rsi(usize),
    Atr(usize),
    VolumeRatio(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Fibonacci(usize),
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::VolumeRatio(period) => write!(f, "VOLUME_RATIO({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Fibonacci(lookback) => write!(f, "FIBONACCI({})", lookback),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<IndicatorValue>>,
}

impl IndicatorSeries {
    /// A series of `len` warm-up values.
    pub fn undefined(indicator_type: IndicatorType, len: usize) -> Self {
        Self {
            indicator_type,
            values: vec![None; len],
        }
    }

    pub fn get(&self, index: usize) -> Option<&IndicatorValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn simple(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(IndicatorValue::as_simple)
    }

    pub fn first_defined(&self) -> Option<usize> {
        self.values.iter().position(Option::is_some)
    }
}

/// Indicator periods and thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    pub squeeze_lookback: usize,
    pub squeeze_percentile: f64,
    pub fibonacci_lookback: usize,
    pub volume_period: usize,
    pub atr_period: usize,
    pub divergence_lookback: usize,
    pub pivot_window: usize,
    pub pivot_lookback: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            bollinger_period: 20,
            bollinger_k: 2.0,
            squeeze_lookback: 120,
            squeeze_percentile: 0.2,
            fibonacci_lookback: 50,
            volume_period: 20,
            atr_period: 14,
            divergence_lookback: 20,
            pivot_window: 5,
            pivot_lookback: 100,
        }
    }
}

const SECTION: &str = "indicators";

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), OrderPointError> {
        let periods = [
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bollinger_period", self.bollinger_period),
            ("squeeze_lookback", self.squeeze_lookback),
            ("fibonacci_lookback", self.fibonacci_lookback),
            ("volume_period", self.volume_period),
            ("atr_period", self.atr_period),
            ("divergence_lookback", self.divergence_lookback),
            ("pivot_window", self.pivot_window),
            ("pivot_lookback", self.pivot_lookback),
        ];
        for (key, value) in periods {
            if value == 0 {
                return Err(OrderPointError::invalid(SECTION, key, "must be at least 1"));
            }
        }
        if self.bollinger_period < 2 {
            return Err(OrderPointError::invalid(
                SECTION,
                "bollinger_period",
                "must be at least 2",
            ));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(OrderPointError::invalid(
                SECTION,
                "macd_fast",
                "macd_fast must be less than macd_slow",
            ));
        }
        if !(self.rsi_oversold > 0.0
            && self.rsi_oversold < self.rsi_overbought
            && self.rsi_overbought < 100.0)
        {
            return Err(OrderPointError::invalid(
                SECTION,
                "rsi_oversold",
                "require 0 < rsi_oversold < rsi_overbought < 100",
            ));
        }
        if !(self.bollinger_k > 0.0) {
            return Err(OrderPointError::invalid(
                SECTION,
                "bollinger_k",
                "must be positive",
            ));
        }
        if !(self.squeeze_percentile > 0.0 && self.squeeze_percentile < 1.0) {
            return Err(OrderPointError::invalid(
                SECTION,
                "squeeze_percentile",
                "must be between 0 and 1",
            ));
        }
        Ok(())
    }

    pub fn rsi_type(&self) -> IndicatorType {
        IndicatorType::Rsi(self.rsi_period)
    }

    pub fn macd_type(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        }
    }

    pub fn bollinger_type(&self) -> IndicatorType {
        IndicatorType::Bollinger {
            period: self.bollinger_period,
            stddev_mult_x100: (self.bollinger_k * 100.0).round() as u32,
        }
    }

    pub fn fibonacci_type(&self) -> IndicatorType {
        IndicatorType::Fibonacci(self.fibonacci_lookback)
    }

    pub fn volume_type(&self) -> IndicatorType {
        IndicatorType::VolumeRatio(self.volume_period)
    }

    pub fn atr_type(&self) -> IndicatorType {
        IndicatorType::Atr(self.atr_period)
    }

    fn bollinger_params(&self) -> BollingerParams {
        BollingerParams {
            period: self.bollinger_period,
            k: self.bollinger_k,
            squeeze_lookback: self.squeeze_lookback,
            squeeze_percentile: self.squeeze_percentile,
        }
    }
}

/// All configured indicator series for one bar series, aligned by bar index.
#[derive(Debug, Clone)]
pub struct IndicatorFrame<'a> {
    series: &'a BarSeries,
    config: IndicatorConfig,
    indicators: HashMap<IndicatorType, IndicatorSeries>,
}

impl<'a> IndicatorFrame<'a> {
    /// Compute every indicator the fusion engine consumes.
    pub fn compute(series: &'a BarSeries, config: &IndicatorConfig) -> Self {
        let bars = series.bars();
        let mut frame = Self::empty(series, config.clone());
        frame.insert(calculate_rsi(bars, config.rsi_period));
        frame.insert(calculate_macd(
            bars,
            config.macd_fast,
            config.macd_slow,
            config.macd_signal,
        ));
        frame.insert(calculate_bollinger(bars, &config.bollinger_params()));
        frame.insert(calculate_fibonacci(bars, config.fibonacci_lookback));
        frame.insert(calculate_volume_ratio(bars, config.volume_period));
        frame.insert(calculate_atr(bars, config.atr_period));
        frame
    }

    /// A frame with no indicator series; callers fill it with [`insert`](Self::insert).
    pub fn empty(series: &'a BarSeries, config: IndicatorConfig) -> Self {
        Self {
            series,
            config,
            indicators: HashMap::new(),
        }
    }

    pub fn insert(&mut self, indicator: IndicatorSeries) {
        self.indicators
            .insert(indicator.indicator_type.clone(), indicator);
    }

    pub fn series(&self) -> &BarSeries {
        self.series
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn bar(&self, index: usize) -> Option<&Bar> {
        self.series.get(index)
    }

    pub fn get(&self, indicator_type: &IndicatorType) -> Option<&IndicatorSeries> {
        self.indicators.get(indicator_type)
    }

    pub fn value(&self, indicator_type: &IndicatorType, index: usize) -> Option<&IndicatorValue> {
        self.get(indicator_type).and_then(|s| s.get(index))
    }

    pub fn rsi(&self, index: usize) -> Option<f64> {
        self.value(&self.config.rsi_type(), index)
            .and_then(IndicatorValue::as_simple)
    }

    pub fn atr(&self, index: usize) -> Option<f64> {
        self.value(&self.config.atr_type(), index)
            .and_then(IndicatorValue::as_simple)
    }

    pub fn volume_ratio(&self, index: usize) -> Option<f64> {
        self.value(&self.config.volume_type(), index)
            .and_then(IndicatorValue::as_simple)
    }

    /// (line, signal, histogram)
    pub fn macd(&self, index: usize) -> Option<(f64, f64, f64)> {
        match self.value(&self.config.macd_type(), index)? {
            IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } => Some((*line, *signal, *histogram)),
            _ => None,
        }
    }

    pub fn bollinger(&self, index: usize) -> Option<&IndicatorValue> {
        self.value(&self.config.bollinger_type(), index)
            .filter(|v| matches!(v, IndicatorValue::Bollinger { .. }))
    }

    pub fn fibonacci(&self, index: usize) -> Option<&FibonacciLevels> {
        match self.value(&self.config.fibonacci_type(), index)? {
            IndicatorValue::Fibonacci(levels) => Some(levels),
            _ => None,
        }
    }

    /// Confirmed swing levels visible at `index`.
    pub fn support_resistance(&self, index: usize) -> SupportResistance {
        support_resistance(
            self.series.bars(),
            index,
            self.config.pivot_window,
            self.config.pivot_lookback,
        )
    }
}
