//! Bar-by-bar backtest over fused signals.
//!
//! [`Backtester::step`] evaluates one bar: it first resolves exits for an
//! open position (stop, then target, then reversal), then considers a new
//! entry. Entries fill at the signal bar's close and are only checked for
//! exits from the following bar on. [`Backtester::finish`] closes anything
//! still open at the last close, unwinds an entry made on that same bar, and
//! computes metrics.

use log::{debug, info};

use super::error::OrderPointError;
use super::execution::{
    apply_slippage_exit, check_triggers, enter_position, exit_position, EntryResult,
    ExecutionConfig, PositionSizing, SizingParams,
};
use super::fusion::FusionEngine;
use super::indicator::{IndicatorConfig, IndicatorFrame};
use super::metrics::Metrics;
use super::ohlcv::BarSeries;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{ExitReason, Trade};
use super::signal::{Direction, Signal};
use super::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TakeProfitMode {
    /// Close everything at take_profit_1.
    #[default]
    Full,
    /// Close `scale_out_fraction` at take_profit_1, move the stop to
    /// break-even and run the rest to take_profit_2.
    Scaled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub sizing: PositionSizing,
    pub max_position_risk: f64,
    pub max_position_fraction: f64,
    pub take_profit_mode: TakeProfitMode,
    pub scale_out_fraction: f64,
    pub allow_shorting: bool,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000.0,
            sizing: PositionSizing::Risk,
            max_position_risk: 0.02,
            max_position_fraction: 1.0,
            take_profit_mode: TakeProfitMode::Full,
            scale_out_fraction: 0.5,
            allow_shorting: true,
            commission_pct: 0.0,
            slippage_pct: 0.0,
            risk_free_rate: 0.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), OrderPointError> {
        const SECTION: &str = "backtest";
        if !(self.initial_capital > 0.0 && self.initial_capital.is_finite()) {
            return Err(OrderPointError::invalid(
                SECTION,
                "initial_capital",
                "must be positive",
            ));
        }
        if !(self.max_position_risk > 0.0 && self.max_position_risk < 1.0) {
            return Err(OrderPointError::invalid(
                SECTION,
                "max_position_risk",
                "must be between 0 and 1 (exclusive)",
            ));
        }
        if !(self.max_position_fraction > 0.0 && self.max_position_fraction <= 1.0) {
            return Err(OrderPointError::invalid(
                SECTION,
                "max_position_fraction",
                "must be in (0, 1]",
            ));
        }
        if !(self.scale_out_fraction > 0.0 && self.scale_out_fraction < 1.0) {
            return Err(OrderPointError::invalid(
                SECTION,
                "scale_out_fraction",
                "must be between 0 and 1 (exclusive)",
            ));
        }
        for (key, value) in [
            ("commission_pct", self.commission_pct),
            ("slippage_pct", self.slippage_pct),
        ] {
            if !(value >= 0.0 && value < 100.0) {
                return Err(OrderPointError::invalid(
                    SECTION,
                    key,
                    "must be between 0 and 100",
                ));
            }
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            return Err(OrderPointError::invalid(
                SECTION,
                "risk_free_rate",
                "must be in [0, 1)",
            ));
        }
        Ok(())
    }

    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            commission_pct: self.commission_pct,
            slippage_pct: self.slippage_pct,
            allow_shorting: self.allow_shorting,
        }
    }

    pub fn sizing_params(&self) -> SizingParams {
        SizingParams {
            sizing: self.sizing,
            max_position_risk: self.max_position_risk,
            max_position_fraction: self.max_position_fraction,
        }
    }
}

/// Everything a report renderer needs. Plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars: usize,
    pub initial_capital: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
    pub signals_evaluated: usize,
    pub actionable_signals: usize,
}

/// Step-wise simulator. Call [`step`](Self::step) for indices in order,
/// then [`finish`](Self::finish).
#[derive(Debug, Clone)]
pub struct Backtester {
    engine: FusionEngine,
    config: BacktestConfig,
    execution: ExecutionConfig,
    sizing: SizingParams,
    portfolio: Portfolio,
    next_index: usize,
    signals_evaluated: usize,
    actionable_signals: usize,
}

impl Backtester {
    pub fn new(engine: FusionEngine, config: BacktestConfig) -> Result<Self, OrderPointError> {
        config.validate()?;
        Ok(Backtester {
            engine,
            execution: config.execution(),
            sizing: config.sizing_params(),
            portfolio: Portfolio::new(config.initial_capital),
            config,
            next_index: 0,
            signals_evaluated: 0,
            actionable_signals: 0,
        })
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Process bar `index`. Indices must be visited in increasing order.
    pub fn step(&mut self, frame: &IndicatorFrame<'_>, index: usize) -> Result<Signal, OrderPointError> {
        if index < self.next_index {
            return Err(OrderPointError::Data {
                reason: format!("bar {} already processed", index),
            });
        }
        let Some(bar) = frame.bar(index) else {
            return Err(OrderPointError::Data {
                reason: format!("bar {} is outside the series", index),
            });
        };
        self.next_index = index + 1;

        self.resolve_triggers(frame, index);

        let signal = self.engine.evaluate(frame, index).ok_or_else(|| OrderPointError::Data {
            reason: format!("bar {} is outside the series", index),
        })?;
        self.signals_evaluated += 1;
        let min_confidence = self.engine.config().min_confidence;
        let actionable = signal.is_actionable(min_confidence);
        if actionable {
            self.actionable_signals += 1;
        }

        if actionable {
            self.maybe_reverse(&signal, index);
        }

        let is_last = index + 1 >= frame.len();
        if actionable && !is_last && !self.portfolio.has_position() {
            match enter_position(&mut self.portfolio, &signal, &self.sizing, &self.execution) {
                EntryResult::Entered {
                    size,
                    execution_price,
                    ..
                } => debug!(
                    "bar {}: opened {} {:.6} @ {:.4} stop {:.4} target {:.4} ({:.2})",
                    index,
                    signal.direction,
                    size,
                    execution_price,
                    signal.stop_loss,
                    signal.take_profit_1,
                    signal.confidence
                ),
                other => debug!("bar {}: {} signal not entered: {:?}", index, signal.direction, other),
            }
        }

        let equity = self.portfolio.total_equity(bar.close);
        self.portfolio.record_equity(index, bar.timestamp, equity);
        Ok(signal)
    }

    /// Stop and target exits for a position opened on an earlier bar.
    fn resolve_triggers(&mut self, frame: &IndicatorFrame<'_>, index: usize) {
        let Some(bar) = frame.bar(index) else { return };
        let Some(position) = self.portfolio.position.as_ref() else {
            return;
        };
        if position.entry_index >= index {
            return;
        }
        let Some((reason, price)) = check_triggers(position, bar) else {
            return;
        };

        let scale_out = reason == ExitReason::TakeProfit
            && self.config.take_profit_mode == TakeProfitMode::Scaled
            && !position.scaled_out;
        let fraction = if scale_out {
            self.config.scale_out_fraction
        } else {
            1.0
        };

        let trade = exit_position(
            &mut self.portfolio,
            price,
            fraction,
            index,
            bar.timestamp,
            reason,
            &self.execution,
        );
        if let Some(trade) = &trade {
            debug!(
                "bar {}: {} exit of {:.6} @ {:.4}, pnl {:.2}",
                index, reason, trade.size, trade.exit_price, trade.pnl
            );
        }

        if scale_out {
            if let Some(pos) = self.portfolio.position.as_mut() {
                pos.stop_loss = pos.entry_price;
                pos.take_profit = pos.take_profit_2;
                pos.scaled_out = true;
            }
        }
    }

    /// Close an open position against an opposite actionable signal.
    fn maybe_reverse(&mut self, signal: &Signal, index: usize) {
        let Some(position) = self.portfolio.position.as_ref() else {
            return;
        };
        if position.entry_index >= index || signal.direction != position.direction.opposite() {
            return;
        }
        let price = apply_slippage_exit(signal.close, position.direction, self.execution.slippage_pct);
        if let Some(trade) = exit_position(
            &mut self.portfolio,
            price,
            1.0,
            index,
            signal.timestamp,
            ExitReason::ReversalSignal,
            &self.execution,
        ) {
            debug!("bar {}: reversal exit, pnl {:.2}", index, trade.pnl);
        }
    }

    /// Close any open position at the last processed bar and build the report.
    ///
    /// A position opened on that same bar has no later bar to exit on, so its
    /// entry is unwound instead: the commission is refunded and no trade is
    /// recorded.
    pub fn finish(mut self, frame: &IndicatorFrame<'_>) -> BacktestReport {
        let last = self.next_index.checked_sub(1).and_then(|i| frame.bar(i).map(|b| (i, b)));
        if let (Some((index, bar)), Some(position)) = (last, self.portfolio.position.as_ref()) {
            if position.entry_index >= index {
                debug!("bar {}: unwinding {} entry opened on the final bar", index, position.direction);
                self.portfolio.cash += position.entry_commission;
                self.portfolio.position = None;
            } else {
                let price =
                    apply_slippage_exit(bar.close, position.direction, self.execution.slippage_pct);
                exit_position(
                    &mut self.portfolio,
                    price,
                    1.0,
                    index,
                    bar.timestamp,
                    ExitReason::EndOfData,
                    &self.execution,
                );
            }
            let cash = self.portfolio.cash;
            if let Some(point) = self.portfolio.equity_curve.last_mut() {
                point.equity = cash;
            }
        }

        let series = frame.series();
        let metrics = Metrics::compute(
            &self.portfolio,
            series.timeframe().periods_per_year(),
            self.config.risk_free_rate,
        );
        BacktestReport {
            symbol: series.symbol().to_string(),
            timeframe: series.timeframe(),
            bars: self.portfolio.equity_curve.len(),
            initial_capital: self.portfolio.initial_capital,
            trades: self.portfolio.closed_trades,
            equity_curve: self.portfolio.equity_curve,
            metrics,
            signals_evaluated: self.signals_evaluated,
            actionable_signals: self.actionable_signals,
        }
    }
}

/// Compute indicators for `series` and replay every bar.
pub fn run_backtest(
    series: &BarSeries,
    indicator_config: &IndicatorConfig,
    engine: &FusionEngine,
    config: &BacktestConfig,
) -> Result<BacktestReport, OrderPointError> {
    indicator_config.validate()?;
    info!(
        "backtest {} {}: {} bars, capital {:.2}",
        series.symbol(),
        series.timeframe(),
        series.len(),
        config.initial_capital
    );

    let frame = IndicatorFrame::compute(series, indicator_config);
    let mut backtester = Backtester::new(engine.clone(), config.clone())?;
    for index in 0..frame.len() {
        backtester.step(&frame, index)?;
    }
    let report = backtester.finish(&frame);

    info!(
        "backtest {} done: {} trades, return {:.2}%, max drawdown {:.2}%",
        report.symbol,
        report.metrics.total_trades,
        report.metrics.total_return * 100.0,
        report.metrics.max_drawdown * 100.0
    );
    Ok(report)
}

impl BacktestReport {
    pub fn final_equity(&self) -> f64 {
        self.metrics.final_equity
    }

    pub fn trades_by(&self, direction: Direction) -> impl Iterator<Item = &Trade> + '_ {
        self.trades.iter().filter(move |t| t.direction == direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fusion::FusionConfig;
    use crate::domain::indicator::{IndicatorSeries, IndicatorValue};
    use crate::domain::ohlcv::Bar;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn make_bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    fn flat_series(n: usize) -> BarSeries {
        let bars = (0..n).map(|i| make_bar(i, 100.0, 100.0, 100.0, 100.0)).collect();
        BarSeries::new("FLAT", Timeframe::H1, bars).unwrap()
    }

    /// Frame whose only opinions are RSI and MACD values placed by hand.
    /// `rsi` and `macd_line` are per-bar; MACD signal line is zero. A bar
    /// with RSI 25 after a neutral reading and a fresh MACD cross is a BUY.
    fn scripted_frame<'a>(
        series: &'a BarSeries,
        rsi: &[Option<f64>],
        macd_line: &[Option<f64>],
        atr: f64,
    ) -> IndicatorFrame<'a> {
        let config = IndicatorConfig::default();
        let mut frame = IndicatorFrame::empty(series, config.clone());
        frame.insert(IndicatorSeries {
            indicator_type: config.rsi_type(),
            values: rsi.iter().map(|v| v.map(IndicatorValue::Simple)).collect(),
        });
        frame.insert(IndicatorSeries {
            indicator_type: config.macd_type(),
            values: macd_line
                .iter()
                .map(|v| {
                    v.map(|line| IndicatorValue::Macd {
                        line,
                        signal: 0.0,
                        histogram: line,
                    })
                })
                .collect(),
        });
        frame.insert(IndicatorSeries {
            indicator_type: config.atr_type(),
            values: vec![Some(IndicatorValue::Simple(atr)); series.len()],
        });
        frame
    }

    fn engine() -> FusionEngine {
        FusionEngine::new(FusionConfig::default()).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(BacktestConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_capital_rejected() {
        let config = BacktestConfig {
            initial_capital: 0.0,
            ..Default::default()
        };
        assert!(Backtester::new(engine(), config).is_err());
    }

    #[test]
    fn flat_series_never_trades() {
        let series = flat_series(10);
        let report = run_backtest(
            &series,
            &IndicatorConfig::default(),
            &engine(),
            &BacktestConfig::default(),
        )
        .unwrap();
        assert!(report.trades.is_empty());
        assert_eq!(report.actionable_signals, 0);
        assert_eq!(report.equity_curve.len(), 10);
        assert_abs_diff_eq!(report.final_equity(), 10_000.0);
    }

    #[test]
    fn buy_then_end_of_data() {
        // bar 1: RSI oversold + MACD bullish cross → BUY at 100
        let bars = vec![
            make_bar(0, 100.0, 100.5, 99.5, 100.0),
            make_bar(1, 100.0, 100.5, 99.5, 100.0),
            make_bar(2, 100.0, 101.5, 99.5, 101.0),
            make_bar(3, 101.0, 102.5, 100.5, 102.0),
        ];
        let series = BarSeries::new("TEST", Timeframe::H1, bars).unwrap();
        let frame = scripted_frame(
            &series,
            &[Some(50.0), Some(25.0), None, Some(50.0)],
            &[Some(-1.0), Some(0.5), Some(0.6), Some(0.7)],
            1.0,
        );
        let mut bt = Backtester::new(engine(), BacktestConfig::default()).unwrap();
        let signals: Vec<Signal> = (0..4).map(|i| bt.step(&frame, i).unwrap()).collect();
        assert_eq!(signals[1].direction, Direction::Buy);
        let report = bt.finish(&frame);

        assert_eq!(report.trades.len(), 1);
        let trade = &report.trades[0];
        assert_eq!(trade.entry_index, 1);
        assert_eq!(trade.exit_index, 3);
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert_abs_diff_eq!(trade.entry_price, 100.0);
        assert_abs_diff_eq!(trade.exit_price, 102.0);
        assert_abs_diff_eq!(
            report.final_equity() - report.initial_capital,
            trade.pnl,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            report.equity_curve.last().unwrap().equity,
            report.final_equity(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn stop_wins_when_bar_spans_stop_and_target() {
        // BUY at 100 with ATR 0 → stop 99 (1% floor), tp1 101.5
        let bars = vec![
            make_bar(0, 100.0, 100.5, 99.5, 100.0),
            make_bar(1, 100.0, 100.5, 99.5, 100.0),
            make_bar(2, 100.0, 107.0, 97.0, 100.0),
            make_bar(3, 100.0, 100.5, 99.5, 100.0),
        ];
        let series = BarSeries::new("TEST", Timeframe::H1, bars).unwrap();
        let frame = scripted_frame(
            &series,
            &[Some(50.0), Some(25.0), None, Some(50.0)],
            &[Some(-1.0), Some(0.5), Some(0.6), Some(0.7)],
            0.0,
        );
        let mut bt = Backtester::new(engine(), BacktestConfig::default()).unwrap();
        for i in 0..4 {
            bt.step(&frame, i).unwrap();
        }
        let report = bt.finish(&frame);

        assert_eq!(report.trades.len(), 1);
        let trade = &report.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_abs_diff_eq!(trade.exit_price, 99.0, epsilon = 1e-9);
        assert_eq!(trade.exit_index, 2);
        assert_abs_diff_eq!(trade.r_multiple, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn scaled_take_profit_moves_stop_to_breakeven() {
        // BUY at 100, ATR 0: stop 99, tp1 101.5, tp2 103
        let bars = vec![
            make_bar(0, 100.0, 100.5, 99.5, 100.0),
            make_bar(1, 100.0, 100.5, 99.5, 100.0),
            make_bar(2, 100.0, 102.0, 100.0, 101.8),
            make_bar(3, 101.8, 101.9, 99.8, 100.2),
            make_bar(4, 100.2, 100.5, 99.9, 100.0),
        ];
        let series = BarSeries::new("TEST", Timeframe::H1, bars).unwrap();
        let rsi = [Some(50.0), Some(25.0), None, Some(50.0), Some(50.0)];
        let macd = [Some(-1.0), Some(0.5), Some(0.6), Some(0.7), Some(0.8)];
        let frame = scripted_frame(&series, &rsi, &macd, 0.0);
        let config = BacktestConfig {
            take_profit_mode: TakeProfitMode::Scaled,
            ..Default::default()
        };
        let mut bt = Backtester::new(engine(), config).unwrap();
        for i in 0..5 {
            bt.step(&frame, i).unwrap();
        }
        let report = bt.finish(&frame);

        assert_eq!(report.trades.len(), 2);
        assert_eq!(report.trades[0].exit_reason, ExitReason::TakeProfit);
        assert_abs_diff_eq!(report.trades[0].exit_price, 101.5, epsilon = 1e-9);
        assert_eq!(report.trades[1].exit_reason, ExitReason::StopLoss);
        assert_abs_diff_eq!(report.trades[1].exit_price, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(report.trades[0].size, report.trades[1].size, epsilon = 1e-9);
        let total: f64 = report.trades.iter().map(|t| t.pnl).sum();
        assert_abs_diff_eq!(total, report.final_equity() - 10_000.0, epsilon = 1e-9);
    }

    #[test]
    fn opposite_signal_reverses() {
        // BUY at bar 1, SELL (RSI overbought + bearish cross) at bar 3
        let bars = vec![
            make_bar(0, 100.0, 100.5, 99.5, 100.0),
            make_bar(1, 100.0, 100.5, 99.5, 100.0),
            make_bar(2, 100.0, 100.9, 99.5, 100.5),
            make_bar(3, 100.5, 100.9, 100.1, 100.8),
            make_bar(4, 100.8, 100.9, 100.5, 100.6),
        ];
        let series = BarSeries::new("TEST", Timeframe::H1, bars).unwrap();
        let rsi = [Some(50.0), Some(25.0), None, Some(75.0), Some(50.0)];
        let macd = [Some(-1.0), Some(0.5), Some(0.6), Some(-0.2), Some(-0.3)];
        let frame = scripted_frame(&series, &rsi, &macd, 0.0);
        let mut bt = Backtester::new(engine(), BacktestConfig::default()).unwrap();
        for i in 0..5 {
            bt.step(&frame, i).unwrap();
        }
        let report = bt.finish(&frame);

        assert_eq!(report.trades.len(), 2);
        assert_eq!(report.trades[0].direction, Direction::Buy);
        assert_eq!(report.trades[0].exit_reason, ExitReason::ReversalSignal);
        assert_abs_diff_eq!(report.trades[0].exit_price, 100.8);
        assert_eq!(report.trades[1].direction, Direction::Sell);
        assert_eq!(report.trades[1].entry_index, 3);
        assert_eq!(report.trades[1].exit_reason, ExitReason::EndOfData);
    }

    #[test]
    fn no_entry_on_last_bar() {
        let bars = vec![
            make_bar(0, 100.0, 100.5, 99.5, 100.0),
            make_bar(1, 100.0, 100.5, 99.5, 100.0),
        ];
        let series = BarSeries::new("TEST", Timeframe::H1, bars).unwrap();
        let frame = scripted_frame(&series, &[Some(50.0), Some(25.0)], &[Some(-1.0), Some(0.5)], 1.0);
        let mut bt = Backtester::new(engine(), BacktestConfig::default()).unwrap();
        bt.step(&frame, 0).unwrap();
        let signal = bt.step(&frame, 1).unwrap();
        assert_eq!(signal.direction, Direction::Buy);
        assert!(bt.finish(&frame).trades.is_empty());
    }

    #[test]
    fn stopping_on_entry_bar_unwinds_position() {
        let bars = vec![
            make_bar(0, 100.0, 100.5, 99.5, 100.0),
            make_bar(1, 100.0, 100.5, 99.5, 100.0),
            make_bar(2, 100.0, 101.5, 99.5, 101.0),
        ];
        let series = BarSeries::new("TEST", Timeframe::H1, bars).unwrap();
        let frame = scripted_frame(
            &series,
            &[Some(50.0), Some(25.0), Some(50.0)],
            &[Some(-1.0), Some(0.5), Some(0.6)],
            1.0,
        );
        let config = BacktestConfig {
            commission_pct: 0.1,
            ..Default::default()
        };
        let mut bt = Backtester::new(engine(), config).unwrap();
        bt.step(&frame, 0).unwrap();
        bt.step(&frame, 1).unwrap();
        assert!(bt.portfolio().has_position());
        assert!(bt.portfolio().cash < 10_000.0);

        let report = bt.finish(&frame);
        assert!(report.trades.is_empty());
        assert_eq!(report.equity_curve.len(), 2);
        assert_abs_diff_eq!(report.final_equity(), 10_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            report.equity_curve.last().unwrap().equity,
            10_000.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn steps_must_advance() {
        let series = flat_series(3);
        let frame = IndicatorFrame::compute(&series, &IndicatorConfig::default());
        let mut bt = Backtester::new(engine(), BacktestConfig::default()).unwrap();
        bt.step(&frame, 1).unwrap();
        assert!(bt.step(&frame, 1).is_err());
        assert!(bt.step(&frame, 5).is_err());
    }
}
