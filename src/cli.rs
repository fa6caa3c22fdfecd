//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_notifier::{format_signal, LogNotifier};
use crate::domain::backtest::{self as backtest_engine, BacktestReport};
use crate::domain::config_validation::{load_app_config, AppConfig};
use crate::domain::error::OrderPointError;
use crate::domain::fusion::{Bias, FusionEngine};
use crate::domain::ohlcv::BarSeries;
use crate::domain::timeframe::Timeframe;
use crate::monitor::{analyze_latest, Analysis, MonitorConfig, RealtimeMonitor};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

/// Sections the configuration loader understands.
pub const KNOWN_SECTIONS: [&str; 4] = ["backtest", "fusion", "indicators", "risk"];

#[derive(Parser, Debug)]
#[command(name = "orderpoint", about = "Indicator-fusion order point analyzer and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyse the most recent bar of a CSV file
    Analyze {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Defaults to the file name without extension
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long, default_value = "1h")]
        timeframe: Timeframe,
    },
    /// Replay signals over a CSV file
    Backtest {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory for the CSV report
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long, default_value = "1h")]
        timeframe: Timeframe,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Poll `<SYMBOL>.csv` files in a directory and report new signals
    Monitor {
        #[arg(long)]
        data_dir: PathBuf,
        /// Comma-separated; defaults to every CSV file in the directory
        #[arg(long)]
        symbols: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, default_value = "1h")]
        timeframe: Timeframe,
        /// Seconds between cycles
        #[arg(long, default_value_t = 60)]
        interval: u64,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<usize>,
        /// Bars loaded per symbol each cycle
        #[arg(long, default_value_t = 500)]
        history: usize,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Analyze {
            data,
            config,
            symbol,
            timeframe,
        } => run_analyze(&data, config.as_deref(), symbol.as_deref(), timeframe),
        Command::Backtest {
            data,
            config,
            output,
            symbol,
            timeframe,
        } => run_backtest(
            &data,
            config.as_deref(),
            output.as_deref(),
            symbol.as_deref(),
            timeframe,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Monitor {
            data_dir,
            symbols,
            config,
            timeframe,
            interval,
            cycles,
            history,
        } => run_monitor(
            &data_dir,
            symbols.as_deref(),
            config.as_deref(),
            MonitorConfig {
                timeframe,
                history_bars: history,
                interval: Duration::from_secs(interval),
            },
            cycles,
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load and validate every section, or use defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, OrderPointError> {
    match path {
        Some(path) => {
            let adapter = FileConfigAdapter::from_file(path)?;
            warn_unknown_sections(&adapter);
            load_app_config(&adapter)
        }
        None => Ok(AppConfig::default()),
    }
}

/// Section names in `config` that nothing reads.
pub fn unknown_sections(config: &dyn ConfigPort) -> Vec<String> {
    config
        .sections()
        .into_iter()
        .filter(|s| !KNOWN_SECTIONS.contains(&s.as_str()))
        .collect()
}

fn warn_unknown_sections(config: &dyn ConfigPort) {
    for section in unknown_sections(config) {
        warn!("ignoring unknown config section [{}]", section);
    }
}

/// `--symbol` if given, otherwise the file stem of `data`.
pub fn resolve_symbol(data: &Path, symbol: Option<&str>) -> String {
    match symbol {
        Some(s) => s.to_string(),
        None => data
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UNKNOWN")
            .to_string(),
    }
}

/// Split a comma-separated symbol list, dropping blanks and duplicates.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for s in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !symbols.iter().any(|existing| existing == s) {
            symbols.push(s.to_string());
        }
    }
    symbols
}

fn load_series(
    data: &Path,
    symbol: Option<&str>,
    timeframe: Timeframe,
) -> Result<BarSeries, OrderPointError> {
    let symbol = resolve_symbol(data, symbol);
    info!("loading {} bars from {}", symbol, data.display());
    CsvAdapter::load_file(data, &symbol, timeframe)
}

fn run_analyze(
    data: &Path,
    config: Option<&Path>,
    symbol: Option<&str>,
    timeframe: Timeframe,
) -> Result<(), OrderPointError> {
    let app = load_config(config)?;
    let series = load_series(data, symbol, timeframe)?;
    let analysis = run_analysis(&series, &app)?;
    print_analysis(&analysis);
    Ok(())
}

/// Analyse the last bar of `series` with the configured engine.
pub fn run_analysis(series: &BarSeries, app: &AppConfig) -> Result<Analysis, OrderPointError> {
    let engine = FusionEngine::new(app.fusion.clone())?;
    analyze_latest(series, &app.indicators, &engine)
}

fn print_analysis(analysis: &Analysis) {
    let signal = &analysis.signal;
    eprintln!("\n=== {} @ {} ===", analysis.symbol, signal.timestamp);
    eprintln!("{}", format_signal(&analysis.symbol, signal));

    eprintln!("\nIndicators:");
    if let Some(rsi) = analysis.rsi {
        eprintln!("  RSI:            {:.1}", rsi);
    }
    if let Some(atr) = analysis.atr {
        eprintln!("  ATR:            {:.4}", atr);
    }
    if let Some(volume) = &analysis.volume {
        eprintln!(
            "  Volume:         {:.2}x average{}",
            volume.ratio,
            if volume.high_volume { " (high)" } else { "" }
        );
    }
    if let Some(fib) = &analysis.fibonacci {
        let levels: Vec<String> = fib
            .iter()
            .map(|(ratio, level)| format!("{:.1}%={:.4}", ratio * 100.0, level))
            .collect();
        eprintln!("  Fibonacci:      {}", levels.join(" "));
    }
    let fmt_levels = |levels: &[f64]| {
        levels
            .iter()
            .map(|l| format!("{:.4}", l))
            .collect::<Vec<_>>()
            .join(", ")
    };
    eprintln!("  Support:        {}", fmt_levels(&analysis.levels.support));
    eprintln!("  Resistance:     {}", fmt_levels(&analysis.levels.resistance));

    eprintln!("\nVotes:");
    for (family, vote) in &analysis.votes {
        let text = match vote {
            None => "abstain".to_string(),
            Some(v) => {
                let bias = match v.bias {
                    Bias::Bullish => "bullish",
                    Bias::Bearish => "bearish",
                    Bias::Neutral => "neutral",
                };
                match &v.reason {
                    Some(reason) => format!("{} ({})", bias, reason),
                    None => bias.to_string(),
                }
            }
        };
        eprintln!("  {:<12}{}", family, text);
    }
}

fn run_backtest(
    data: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
    symbol: Option<&str>,
    timeframe: Timeframe,
) -> Result<(), OrderPointError> {
    let app = load_config(config)?;
    let series = load_series(data, symbol, timeframe)?;
    let report = run_backtest_pipeline(&series, &app, output)?;
    print_summary(&report);
    Ok(())
}

/// Run the backtest and write the CSV report when `output` is set.
pub fn run_backtest_pipeline(
    series: &BarSeries,
    app: &AppConfig,
    output: Option<&Path>,
) -> Result<BacktestReport, OrderPointError> {
    let engine = FusionEngine::new(app.fusion.clone())?;
    let report = backtest_engine::run_backtest(series, &app.indicators, &engine, &app.backtest)?;

    if let Some(dir) = output {
        CsvReportAdapter::new().write(&report, &dir.display().to_string())?;
    }
    Ok(report)
}

fn print_summary(report: &BacktestReport) {
    let m = &report.metrics;
    eprintln!(
        "\n=== {} {} ({} bars) ===",
        report.symbol, report.timeframe, report.bars
    );
    eprintln!("Initial Capital:  {:.2}", report.initial_capital);
    eprintln!("Final Equity:     {:.2}", m.final_equity);
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", m.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!(
        "Max Drawdown:     -{:.1}% ({} bars)",
        m.max_drawdown * 100.0,
        m.max_drawdown_duration
    );
    eprintln!(
        "Total Trades:     {} ({} won, {} lost)",
        m.total_trades, m.trades_won, m.trades_lost
    );
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);
    eprintln!("Avg R Multiple:   {:.2}", m.avg_risk_reward);
    eprintln!("Avg Bars Held:    {:.1}", m.avg_bars_held);
    eprintln!(
        "Signals:          {} actionable of {} evaluated",
        report.actionable_signals, report.signals_evaluated
    );
}

fn run_validate(path: &Path) -> Result<(), OrderPointError> {
    eprintln!("Validating config: {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    for section in unknown_sections(&adapter) {
        eprintln!("  warning: unknown section [{}]", section);
    }
    let app = load_app_config(&adapter)?;
    eprintln!(
        "Config is valid: threshold {}, min confidence {}, initial capital {:.2}",
        app.fusion.signal_threshold, app.fusion.min_confidence, app.backtest.initial_capital
    );
    Ok(())
}

fn run_monitor(
    data_dir: &Path,
    symbols: Option<&str>,
    config: Option<&Path>,
    monitor_config: MonitorConfig,
    cycles: Option<usize>,
) -> Result<(), OrderPointError> {
    let app = load_config(config)?;
    let data = CsvAdapter::new(data_dir.to_path_buf());
    let symbols = match symbols {
        Some(raw) => parse_symbols(raw),
        None => data.list_symbols()?,
    };
    let notifier = LogNotifier::new();
    let engine = FusionEngine::new(app.fusion.clone())?;

    let mut monitor = RealtimeMonitor::new(
        symbols,
        &data,
        &notifier,
        app.indicators.clone(),
        engine,
        monitor_config,
    )?;
    let completed = monitor.run(cycles);
    info!("monitor stopped after {} cycle(s)", completed);
    Ok(())
}
