//! CSV backtest report adapter.
//!
//! Writes three files into the output directory: `<SYMBOL>_trades.csv`,
//! `<SYMBOL>_equity.csv` and `<SYMBOL>_summary.csv` (one metrics row).

use crate::domain::backtest::BacktestReport;
use crate::domain::error::OrderPointError;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Paths written for `symbol` under `dir`: trades, equity, summary.
    pub fn output_files(dir: &Path, symbol: &str) -> [PathBuf; 3] {
        [
            dir.join(format!("{}_trades.csv", symbol)),
            dir.join(format!("{}_equity.csv", symbol)),
            dir.join(format!("{}_summary.csv", symbol)),
        ]
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &BacktestReport, output_path: &str) -> Result<(), OrderPointError> {
        let dir = Path::new(output_path);
        fs::create_dir_all(dir)?;
        let [trades, equity, summary] = Self::output_files(dir, &report.symbol);

        write_rows(&trades, &report.trades)?;
        write_rows(&equity, &report.equity_curve)?;
        write_rows(&summary, std::slice::from_ref(&report.metrics))?;

        log::info!("report for {} written to {}", report.symbol, dir.display());
        Ok(())
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), OrderPointError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
