//! Realtime monitoring.
//!
//! The monitor owns no timers or sockets of its own. Each cycle pulls the
//! latest bars for every symbol through a [`MarketDataPort`], evaluates the
//! last bar, and forwards tradable signals to a [`NotificationPort`]. A
//! signal is forwarded once per symbol, direction and bar timestamp.

use crate::domain::error::OrderPointError;
use crate::domain::fusion::{Family, FusionEngine, Vote};
use crate::domain::indicator::{
    volume_profile, FibonacciLevels, IndicatorConfig, IndicatorFrame, SupportResistance,
    VolumeProfile,
};
use crate::domain::ohlcv::BarSeries;
use crate::domain::signal::{Direction, Signal};
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::MarketDataPort;
use crate::ports::notification_port::NotificationPort;
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Granularity at which a waiting monitor notices a stop request.
const STOP_CHECK: Duration = Duration::from_millis(100);

/// Everything known about the most recent bar of a series.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub symbol: String,
    pub signal: Signal,
    pub votes: Vec<(Family, Option<Vote>)>,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub volume: Option<VolumeProfile>,
    pub fibonacci: Option<FibonacciLevels>,
    pub levels: SupportResistance,
}

/// Compute indicators for `series` and analyse its last bar.
pub fn analyze_latest(
    series: &BarSeries,
    indicator_config: &IndicatorConfig,
    engine: &FusionEngine,
) -> Result<Analysis, OrderPointError> {
    let frame = IndicatorFrame::compute(series, indicator_config);
    let index = series.len().saturating_sub(1);
    let signal = engine.evaluate(&frame, index).ok_or_else(|| OrderPointError::Data {
        reason: format!("no bars to analyse for {}", series.symbol()),
    })?;
    Ok(Analysis {
        symbol: series.symbol().to_string(),
        signal,
        votes: engine.votes(&frame, index),
        rsi: frame.rsi(index),
        atr: frame.atr(index),
        volume: volume_profile(
            series.bars(),
            index,
            indicator_config.volume_period,
            engine.config().volume_spike,
        ),
        fibonacci: frame.fibonacci(index).cloned(),
        levels: frame.support_resistance(index),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub timeframe: Timeframe,
    /// Bars requested per symbol each cycle.
    pub history_bars: usize,
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::H1,
            history_bars: 500,
            interval: Duration::from_secs(60),
        }
    }
}

/// Outcome of one polling cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleSummary {
    pub evaluated: usize,
    pub notified: usize,
    pub failed: usize,
}

pub struct RealtimeMonitor<'a> {
    symbols: Vec<String>,
    data: &'a dyn MarketDataPort,
    notifier: &'a dyn NotificationPort,
    indicator_config: IndicatorConfig,
    engine: FusionEngine,
    config: MonitorConfig,
    last_sent: HashMap<String, (Direction, NaiveDateTime)>,
}

impl<'a> RealtimeMonitor<'a> {
    pub fn new(
        symbols: Vec<String>,
        data: &'a dyn MarketDataPort,
        notifier: &'a dyn NotificationPort,
        indicator_config: IndicatorConfig,
        engine: FusionEngine,
        config: MonitorConfig,
    ) -> Result<Self, OrderPointError> {
        indicator_config.validate()?;
        if symbols.is_empty() {
            return Err(OrderPointError::invalid("monitor", "symbols", "no symbols given"));
        }
        if config.history_bars == 0 {
            return Err(OrderPointError::invalid(
                "monitor",
                "history_bars",
                "must be at least 1",
            ));
        }
        Ok(Self {
            symbols,
            data,
            notifier,
            indicator_config,
            engine,
            config,
            last_sent: HashMap::new(),
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Evaluate one symbol and notify if its signal is new and tradable.
    /// Returns the signal that was forwarded, if any.
    pub fn check_symbol(&mut self, symbol: &str) -> Result<Option<Signal>, OrderPointError> {
        let series = self.data.fetch_bars(
            symbol,
            self.config.timeframe,
            Some(self.config.history_bars),
        )?;
        let analysis = analyze_latest(&series, &self.indicator_config, &self.engine)?;
        let signal = analysis.signal;
        debug!(
            "{}: {} confidence {:.2} at {}",
            symbol, signal.direction, signal.confidence, signal.timestamp
        );

        if !signal.is_actionable(self.engine.config().min_confidence) {
            return Ok(None);
        }
        let key = (signal.direction, signal.timestamp);
        if self.last_sent.get(symbol) == Some(&key) {
            debug!("{}: signal already sent for {}", symbol, signal.timestamp);
            return Ok(None);
        }

        self.notifier.notify(symbol, &signal)?;
        self.last_sent.insert(symbol.to_string(), key);
        Ok(Some(signal))
    }

    /// One pass over every symbol. Per-symbol failures are logged and
    /// counted, not propagated.
    pub fn poll_once(&mut self) -> CycleSummary {
        let mut summary = CycleSummary::default();
        let symbols = self.symbols.clone();
        for symbol in &symbols {
            match self.check_symbol(symbol) {
                Ok(sent) => {
                    summary.evaluated += 1;
                    if sent.is_some() {
                        summary.notified += 1;
                    }
                }
                Err(e) => {
                    warn!("{}: {}", symbol, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Poll until `max_cycles` cycles have run, or forever when `None`.
    pub fn run(&mut self, max_cycles: Option<usize>) -> usize {
        self.run_until(&AtomicBool::new(false), max_cycles)
    }

    /// Poll until `stop` is set or `max_cycles` cycles have run, sleeping
    /// `interval` between cycles. The wait re-checks `stop` every
    /// `STOP_CHECK`. Returns the number of cycles completed.
    pub fn run_until(&mut self, stop: &AtomicBool, max_cycles: Option<usize>) -> usize {
        info!(
            "monitoring {} on {} every {:?}",
            self.symbols().join(", "),
            self.config.timeframe,
            self.config.interval
        );
        let mut cycles = 0;
        while !stop.load(Ordering::Relaxed) {
            let summary = self.poll_once();
            cycles += 1;
            info!(
                "cycle {}: {} evaluated, {} notified, {} failed",
                cycles, summary.evaluated, summary.notified, summary.failed
            );
            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }
            wait_or_stop(self.config.interval, stop);
        }
        cycles
    }
}

/// Sleep for `interval`, returning early once `stop` is set.
fn wait_or_stop(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep((deadline - now).min(STOP_CHECK));
    }
}
