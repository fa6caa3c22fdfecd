//! Property tests for indicator and engine invariants.
//!
//! Uses proptest to verify:
//! 1. RSI stays within [0, 100]
//! 2. Bollinger bands are ordered lower <= middle <= upper
//! 3. Signals at bar i depend only on bars 0..=i
//! 4. Evaluation is deterministic
//! 5. Actionable signals carry correctly ordered price levels
//! 6. Backtest P&L adds up to the equity change

mod common;

use common::*;
use orderpoint::domain::backtest::{run_backtest, BacktestConfig, TakeProfitMode};
use orderpoint::domain::fusion::{FusionConfig, FusionEngine};
use orderpoint::domain::indicator::{IndicatorConfig, IndicatorFrame, IndicatorValue};
use orderpoint::domain::signal::Direction;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_moves() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.04..0.04_f64, 40..160)
}

fn arb_volumes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(10.0..10_000.0_f64, 1..12)
}

fn arb_series() -> impl Strategy<Value = BarSeries> {
    (1.0..1_000.0_f64, arb_moves(), arb_volumes())
        .prop_map(|(start, moves, volumes)| make_series("PROP", bars_from_moves(start, &moves, &volumes)))
}

fn engine(threshold: f64) -> FusionEngine {
    FusionEngine::new(FusionConfig {
        signal_threshold: threshold,
        min_confidence: 0.0,
        ..FusionConfig::default()
    })
    .unwrap()
}

// ── 1-2. Indicator bounds ────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn rsi_within_bounds(series in arb_series()) {
        let frame = IndicatorFrame::compute(&series, &IndicatorConfig::default());
        for i in 0..series.len() {
            if let Some(rsi) = frame.rsi(i) {
                prop_assert!((0.0..=100.0).contains(&rsi), "rsi {} at {}", rsi, i);
            }
        }
    }

    #[test]
    fn bollinger_bands_ordered(series in arb_series()) {
        let frame = IndicatorFrame::compute(&series, &IndicatorConfig::default());
        for i in 0..series.len() {
            if let Some(IndicatorValue::Bollinger { upper, middle, lower, bandwidth, .. }) =
                frame.bollinger(i)
            {
                prop_assert!(lower <= middle && middle <= upper);
                prop_assert!(*bandwidth >= 0.0);
            }
        }
    }
}

// ── 3-5. Fusion engine ───────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn signals_are_causal(series in arb_series(), cut in 0.0..1.0_f64) {
        let config = IndicatorConfig::default();
        let engine = engine(0.2);
        let index = ((series.len() - 1) as f64 * cut) as usize;

        let full = IndicatorFrame::compute(&series, &config);
        let prefix_series = series.truncated(index).unwrap();
        let prefix = IndicatorFrame::compute(&prefix_series, &config);

        prop_assert_eq!(engine.evaluate(&full, index), engine.evaluate(&prefix, index));
    }

    #[test]
    fn evaluation_is_deterministic(series in arb_series()) {
        let config = IndicatorConfig::default();
        let engine = engine(0.3);
        let a = IndicatorFrame::compute(&series, &config);
        let b = IndicatorFrame::compute(&series, &config);
        let last = series.len() - 1;
        prop_assert_eq!(engine.evaluate(&a, last), engine.evaluate(&b, last));
    }

    #[test]
    fn signal_levels_ordered(series in arb_series(), threshold in 0.1..0.6_f64) {
        let frame = IndicatorFrame::compute(&series, &IndicatorConfig::default());
        let engine = engine(threshold);
        for i in 0..series.len() {
            let s = engine.evaluate(&frame, i).unwrap();
            prop_assert!((0.0..=1.0).contains(&s.confidence));
            prop_assert!((-1.0..=1.0).contains(&s.score));
            match s.direction {
                Direction::Buy => {
                    prop_assert!(s.stop_loss < s.entry_low, "{:?}", s);
                    prop_assert!(s.entry_low <= s.entry_high);
                    prop_assert!(s.entry_high < s.take_profit_1);
                    prop_assert!(s.take_profit_1 <= s.take_profit_2);
                    prop_assert!(!s.contributing_reasons.is_empty());
                }
                Direction::Sell => {
                    prop_assert!(s.stop_loss > s.entry_high, "{:?}", s);
                    prop_assert!(s.entry_low <= s.entry_high);
                    prop_assert!(s.entry_low > s.take_profit_1);
                    prop_assert!(s.take_profit_1 >= s.take_profit_2);
                    prop_assert!(!s.contributing_reasons.is_empty());
                }
                Direction::Neutral => {
                    prop_assert!(s.score.abs() < threshold);
                }
            }
        }
    }
}

// ── 6. Backtest accounting ───────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pnl_matches_equity_change(
        series in arb_series(),
        threshold in 0.1..0.6_f64,
        allow_shorting in prop::bool::ANY,
        scaled in prop::bool::ANY,
        commission_pct in 0.0..0.2_f64,
        slippage_pct in 0.0..0.1_f64,
    ) {
        let config = BacktestConfig {
            allow_shorting,
            take_profit_mode: if scaled { TakeProfitMode::Scaled } else { TakeProfitMode::Full },
            commission_pct,
            slippage_pct,
            ..BacktestConfig::default()
        };
        let report = run_backtest(&series, &IndicatorConfig::default(), &engine(threshold), &config)
            .unwrap();

        let realized: f64 = report.trades.iter().map(|t| t.pnl).sum();
        let change = report.final_equity() - report.initial_capital;
        prop_assert!((realized - change).abs() < 1e-6 * report.initial_capital.max(1.0));
        prop_assert_eq!(report.equity_curve.len(), series.len());

        for trade in &report.trades {
            prop_assert!(trade.exit_index > trade.entry_index);
            if !allow_shorting {
                prop_assert_eq!(trade.direction, Direction::Buy);
            }
        }
        if !scaled {
            for pair in report.trades.windows(2) {
                prop_assert!(pair[1].entry_index >= pair[0].exit_index);
            }
        }
    }
}
