//! Typed configuration loading.
//!
//! Reads every section through a [`ConfigPort`], falls back to defaults
//! for absent keys, rejects unparsable values, then runs each typed
//! config's `validate()`. Nothing downstream re-checks configuration.

use crate::domain::backtest::{BacktestConfig, TakeProfitMode};
use crate::domain::error::OrderPointError;
use crate::domain::execution::PositionSizing;
use crate::domain::fusion::{FamilyWeights, FusionConfig, RiskConfig};
use crate::domain::indicator::IndicatorConfig;
use crate::ports::config_port::ConfigPort;
use std::str::FromStr;

/// All sections, validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub indicators: IndicatorConfig,
    pub fusion: FusionConfig,
    pub backtest: BacktestConfig,
}

pub fn load_app_config(config: &dyn ConfigPort) -> Result<AppConfig, OrderPointError> {
    Ok(AppConfig {
        indicators: build_indicator_config(config)?,
        fusion: build_fusion_config(config)?,
        backtest: build_backtest_config(config)?,
    })
}

pub fn build_indicator_config(config: &dyn ConfigPort) -> Result<IndicatorConfig, OrderPointError> {
    const S: &str = "indicators";
    let d = IndicatorConfig::default();
    let built = IndicatorConfig {
        rsi_period: read(config, S, "rsi_period", d.rsi_period)?,
        rsi_oversold: read(config, S, "rsi_oversold", d.rsi_oversold)?,
        rsi_overbought: read(config, S, "rsi_overbought", d.rsi_overbought)?,
        macd_fast: read(config, S, "macd_fast", d.macd_fast)?,
        macd_slow: read(config, S, "macd_slow", d.macd_slow)?,
        macd_signal: read(config, S, "macd_signal", d.macd_signal)?,
        bollinger_period: read(config, S, "bollinger_period", d.bollinger_period)?,
        bollinger_k: read(config, S, "bollinger_k", d.bollinger_k)?,
        squeeze_lookback: read(config, S, "squeeze_lookback", d.squeeze_lookback)?,
        squeeze_percentile: read(config, S, "squeeze_percentile", d.squeeze_percentile)?,
        fibonacci_lookback: read(config, S, "fibonacci_lookback", d.fibonacci_lookback)?,
        volume_period: read(config, S, "volume_period", d.volume_period)?,
        atr_period: read(config, S, "atr_period", d.atr_period)?,
        divergence_lookback: read(config, S, "divergence_lookback", d.divergence_lookback)?,
        pivot_window: read(config, S, "pivot_window", d.pivot_window)?,
        pivot_lookback: read(config, S, "pivot_lookback", d.pivot_lookback)?,
    };
    built.validate()?;
    Ok(built)
}

/// `[fusion]` plus the `[risk]` section that shapes signal levels.
pub fn build_fusion_config(config: &dyn ConfigPort) -> Result<FusionConfig, OrderPointError> {
    const S: &str = "fusion";
    let d = FusionConfig::default();
    let w = &d.weights;
    let built = FusionConfig {
        signal_threshold: read(config, S, "signal_threshold", d.signal_threshold)?,
        min_confidence: read(config, S, "min_confidence", d.min_confidence)?,
        agreement_boost: read(config, S, "agreement_boost", d.agreement_boost)?,
        volume_spike: read(config, S, "volume_spike", d.volume_spike)?,
        fib_proximity_pct: read(config, S, "fib_proximity_pct", d.fib_proximity_pct)?,
        entry_atr_mult: read(config, S, "entry_atr_mult", d.entry_atr_mult)?,
        fallback_stop_atr_mult: read(config, S, "fallback_stop_atr_mult", d.fallback_stop_atr_mult)?,
        weights: FamilyWeights {
            rsi: read(config, S, "weight_rsi", w.rsi)?,
            macd: read(config, S, "weight_macd", w.macd)?,
            bollinger: read(config, S, "weight_bollinger", w.bollinger)?,
            fibonacci: read(config, S, "weight_fibonacci", w.fibonacci)?,
            volume: read(config, S, "weight_volume", w.volume)?,
            divergence: read(config, S, "weight_divergence", w.divergence)?,
        },
        risk: build_risk_config(config)?,
    };
    built.validate()?;
    Ok(built)
}

pub fn build_risk_config(config: &dyn ConfigPort) -> Result<RiskConfig, OrderPointError> {
    const S: &str = "risk";
    let d = RiskConfig::default();
    let built = RiskConfig {
        stop_loss_floor_pct: read(config, S, "stop_loss_floor_pct", d.stop_loss_floor_pct)?,
        take_profit_1_rr: read(config, S, "take_profit_1_rr", d.take_profit_1_rr)?,
        take_profit_2_rr: read(config, S, "take_profit_2_rr", d.take_profit_2_rr)?,
    };
    built.validate()?;
    Ok(built)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, OrderPointError> {
    const S: &str = "backtest";
    let d = BacktestConfig::default();

    let sizing = match config.get_string(S, "sizing").as_deref().map(str::trim) {
        None => d.sizing,
        Some(s) if s.eq_ignore_ascii_case("risk") => PositionSizing::Risk,
        Some(s) if s.eq_ignore_ascii_case("fixed") => PositionSizing::Fixed,
        Some(s) => {
            return Err(OrderPointError::invalid(
                S,
                "sizing",
                format!("expected risk or fixed, got '{}'", s),
            ))
        }
    };
    let take_profit_mode = match config.get_string(S, "take_profit_mode").as_deref().map(str::trim) {
        None => d.take_profit_mode,
        Some(s) if s.eq_ignore_ascii_case("full") => TakeProfitMode::Full,
        Some(s) if s.eq_ignore_ascii_case("scaled") => TakeProfitMode::Scaled,
        Some(s) => {
            return Err(OrderPointError::invalid(
                S,
                "take_profit_mode",
                format!("expected full or scaled, got '{}'", s),
            ))
        }
    };

    let built = BacktestConfig {
        initial_capital: read(config, S, "initial_capital", d.initial_capital)?,
        sizing,
        max_position_risk: read(config, S, "max_position_risk", d.max_position_risk)?,
        max_position_fraction: read(config, S, "max_position_fraction", d.max_position_fraction)?,
        take_profit_mode,
        scale_out_fraction: read(config, S, "scale_out_fraction", d.scale_out_fraction)?,
        allow_shorting: read_bool(config, S, "allow_shorting", d.allow_shorting)?,
        commission_pct: read(config, S, "commission_pct", d.commission_pct)?,
        slippage_pct: read(config, S, "slippage_pct", d.slippage_pct)?,
        risk_free_rate: read(config, S, "risk_free_rate", d.risk_free_rate)?,
    };
    built.validate()?;
    Ok(built)
}

/// Parse `[section] key`, or `default` when the key is absent.
fn read<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, OrderPointError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            OrderPointError::invalid(section, key, format!("cannot parse '{}'", raw.trim()))
        }),
    }
}

fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, OrderPointError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            other => Err(OrderPointError::invalid(
                section,
                key,
                format!("expected a boolean, got '{}'", other),
            )),
        },
    }
}
