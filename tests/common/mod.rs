#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use orderpoint::domain::error::OrderPointError;
pub use orderpoint::domain::ohlcv::{Bar, BarSeries};
use orderpoint::domain::signal::Signal;
use orderpoint::domain::timeframe::Timeframe;
use orderpoint::ports::data_port::MarketDataPort;
use orderpoint::ports::notification_port::NotificationPort;
use std::cell::RefCell;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: Option<usize>,
    ) -> Result<BarSeries, OrderPointError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(OrderPointError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(symbol).cloned().unwrap_or_default();
        let skip = limit.map_or(0, |l| bars.len().saturating_sub(l));
        Ok(BarSeries::new(symbol, timeframe, bars[skip..].to_vec())?)
    }

    fn list_symbols(&self) -> Result<Vec<String>, OrderPointError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<(String, Signal)>>,
}

impl NotificationPort for RecordingNotifier {
    fn notify(&self, symbol: &str, signal: &Signal) -> Result<(), OrderPointError> {
        self.sent.borrow_mut().push((symbol.to_string(), signal.clone()));
        Ok(())
    }
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn hour(i: usize) -> NaiveDateTime {
    start_time() + chrono::Duration::hours(i as i64)
}

/// An hourly bar opening at the previous close.
pub fn make_bar(i: usize, prev_close: f64, close: f64, volume: f64) -> Bar {
    Bar {
        timestamp: hour(i),
        open: prev_close,
        high: prev_close.max(close) * 1.002,
        low: prev_close.min(close) * 0.998,
        close,
        volume,
    }
}

/// Hourly bars through the given closes, constant volume.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let prev = if i == 0 { close } else { closes[i - 1] };
            make_bar(i, prev, close, 1_000.0)
        })
        .collect()
}

/// Hourly bars following a sine wave around `start_price`.
pub fn generate_bars(count: usize, start_price: f64, amplitude: f64, period: f64) -> Vec<Bar> {
    let closes: Vec<f64> = (0..count)
        .map(|i| start_price + amplitude * (i as f64 * std::f64::consts::TAU / period).sin())
        .collect();
    let mut bars = bars_from_closes(&closes);
    for (i, bar) in bars.iter_mut().enumerate() {
        bar.volume = 1_000.0 + 500.0 * ((i % 7) as f64);
    }
    bars
}

/// Hourly bars from per-bar percentage moves, for property tests.
pub fn bars_from_moves(start_price: f64, moves: &[f64], volumes: &[f64]) -> Vec<Bar> {
    let mut closes = Vec::with_capacity(moves.len());
    let mut price = start_price;
    for m in moves {
        price = (price * (1.0 + m)).max(0.01);
        closes.push(price);
    }
    let mut bars = bars_from_closes(&closes);
    for (bar, &volume) in bars.iter_mut().zip(volumes.iter().cycle()) {
        bar.volume = volume;
    }
    bars
}

pub fn make_series(symbol: &str, bars: Vec<Bar>) -> BarSeries {
    BarSeries::new(symbol, Timeframe::H1, bars).unwrap()
}
