//! CSV file market data adapter.
//!
//! One file per symbol, `<base>/<SYMBOL>.csv`, with a header row and
//! columns `timestamp,open,high,low,close,volume`. Timestamps are epoch
//! milliseconds or `%Y-%m-%d %H:%M:%S` / `%Y-%m-%dT%H:%M:%S` / `%Y-%m-%d`.
//! Rows are taken in file order; out-of-order files are rejected by
//! [`BarSeries::new`].

use crate::domain::error::OrderPointError;
use crate::domain::ohlcv::{Bar, BarSeries};
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::MarketDataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Load a single CSV file as a bar series.
    pub fn load_file(
        path: &Path,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<BarSeries, OrderPointError> {
        let bars = read_bars(path)?;
        Ok(BarSeries::new(symbol, timeframe, bars)?)
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: Option<usize>,
    ) -> Result<BarSeries, OrderPointError> {
        let mut bars = read_bars(&self.csv_path(symbol))?;
        if let Some(limit) = limit {
            let skip = bars.len().saturating_sub(limit);
            bars.drain(..skip);
        }
        Ok(BarSeries::new(symbol, timeframe, bars)?)
    }

    fn list_symbols(&self) -> Result<Vec<String>, OrderPointError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| OrderPointError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| OrderPointError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

fn read_bars(path: &Path) -> Result<Vec<Bar>, OrderPointError> {
    let content = fs::read_to_string(path).map_err(|e| OrderPointError::Data {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let field = |idx: usize, name: &str| {
            record.get(idx).ok_or_else(|| OrderPointError::Data {
                reason: format!("row {}: missing {} column", row + 1, name),
            })
        };
        let number = |idx: usize, name: &str| -> Result<f64, OrderPointError> {
            field(idx, name)?.parse().map_err(|e| OrderPointError::Data {
                reason: format!("row {}: invalid {} value: {}", row + 1, name, e),
            })
        };

        let timestamp = parse_timestamp(field(0, "timestamp")?).ok_or_else(|| {
            OrderPointError::Data {
                reason: format!("row {}: unrecognised timestamp", row + 1),
            }
        })?;

        bars.push(Bar {
            timestamp,
            open: number(1, "open")?,
            high: number(2, "high")?,
            low: number(3, "low")?,
            close: number(4, "close")?,
            volume: number(5, "volume")?,
        });
    }

    Ok(bars)
}

/// Epoch milliseconds or one of the accepted date-time layouts.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = raw.parse().ok()?;
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc());
    }
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
