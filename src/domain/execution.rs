//! Trade execution and fill simulation.
//!
//! Implements entry/exit fills with slippage, position sizing, commissions,
//! and stop-loss/take-profit trigger checking against bar ranges.

use chrono::NaiveDateTime;

use super::ohlcv::Bar;
use super::portfolio::Portfolio;
use super::position::{ExitReason, Position, Trade};
use super::signal::{Direction, Signal};

/// Per-side frictions.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub allow_shorting: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_pct: 0.0,
            slippage_pct: 0.0,
            allow_shorting: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionSizing {
    /// Size so that a stop-out loses `max_position_risk` of equity.
    #[default]
    Risk,
    /// Always commit `max_position_fraction` of equity.
    Fixed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizingParams {
    pub sizing: PositionSizing,
    pub max_position_risk: f64,
    pub max_position_fraction: f64,
}

/// Calculate commission: trade_value * pct / 100.
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    trade_value * config.commission_pct / 100.0
}

/// Entry fill: longs pay up, shorts sell lower.
pub fn apply_slippage_entry(market_price: f64, direction: Direction, slippage_pct: f64) -> f64 {
    market_price * (1.0 + direction.sign() * slippage_pct / 100.0)
}

/// Exit fill: longs sell lower, shorts cover higher.
pub fn apply_slippage_exit(market_price: f64, direction: Direction, slippage_pct: f64) -> f64 {
    market_price * (1.0 - direction.sign() * slippage_pct / 100.0)
}

/// Units to trade at `entry_price` with a protective stop at `stop_loss`.
pub fn position_size(equity: f64, entry_price: f64, stop_loss: f64, params: &SizingParams) -> f64 {
    if equity <= 0.0 || entry_price <= 0.0 {
        return 0.0;
    }
    let cap = params.max_position_fraction * equity / entry_price;
    match params.sizing {
        PositionSizing::Fixed => cap,
        PositionSizing::Risk => {
            let per_unit = (entry_price - stop_loss).abs();
            if per_unit > 0.0 {
                (params.max_position_risk * equity / per_unit).min(cap)
            } else {
                cap
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        size: f64,
        execution_price: f64,
        commission: f64,
    },
    InsufficientCapital,
    ShortingDisabled,
    PositionOpen,
    NotActionable,
}

/// Open a position from an actionable signal at its bar's close.
pub fn enter_position(
    portfolio: &mut Portfolio,
    signal: &Signal,
    sizing: &SizingParams,
    config: &ExecutionConfig,
) -> EntryResult {
    if portfolio.has_position() {
        return EntryResult::PositionOpen;
    }
    let direction = signal.direction;
    match direction {
        Direction::Neutral => return EntryResult::NotActionable,
        Direction::Sell if !config.allow_shorting => return EntryResult::ShortingDisabled,
        _ => {}
    }

    let execution_price = apply_slippage_entry(signal.close, direction, config.slippage_pct);
    let equity = portfolio.cash;
    let size = position_size(equity, execution_price, signal.stop_loss, sizing);
    if !(size.is_finite() && size > 0.0) {
        return EntryResult::InsufficientCapital;
    }
    let commission = calculate_commission(size * execution_price, config);
    if commission >= equity {
        return EntryResult::InsufficientCapital;
    }

    portfolio.cash -= commission;
    portfolio.position = Some(Position {
        direction,
        size,
        entry_price: execution_price,
        entry_index: signal.index,
        entry_timestamp: signal.timestamp,
        stop_loss: signal.stop_loss,
        take_profit: signal.take_profit_1,
        take_profit_2: signal.take_profit_2,
        initial_stop: signal.stop_loss,
        entry_commission: commission,
        scaled_out: false,
    });

    EntryResult::Entered {
        size,
        execution_price,
        commission,
    }
}

/// Close `fraction` (0, 1] of the open position at `exit_price`.
///
/// The matching share of the entry commission is charged to the trade, so
/// the sum of trade PnL always equals the change in cash.
pub fn exit_position(
    portfolio: &mut Portfolio,
    exit_price: f64,
    fraction: f64,
    index: usize,
    timestamp: NaiveDateTime,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<Trade> {
    let fraction = fraction.clamp(0.0, 1.0);
    let position = portfolio.position.as_mut()?;

    let size = position.size * fraction;
    let entry_commission = position.entry_commission * fraction;
    let exit_commission = calculate_commission(size * exit_price, config);
    let gross = position.direction.sign() * size * (exit_price - position.entry_price);
    let pnl = gross - entry_commission - exit_commission;

    let initial_risk = (position.entry_price - position.initial_stop).abs() * size;
    let notional = position.entry_price * size;
    let trade = Trade {
        direction: position.direction,
        entry_index: position.entry_index,
        exit_index: index,
        entry_timestamp: position.entry_timestamp,
        exit_timestamp: timestamp,
        entry_price: position.entry_price,
        exit_price,
        size,
        pnl,
        return_pct: if notional > 0.0 { pnl / notional * 100.0 } else { 0.0 },
        exit_reason: reason,
        initial_risk,
        r_multiple: if initial_risk > 0.0 { pnl / initial_risk } else { 0.0 },
    };

    portfolio.cash += gross - exit_commission;
    if fraction >= 1.0 {
        portfolio.position = None;
    } else {
        position.size -= size;
        position.entry_commission -= entry_commission;
    }
    portfolio.record_trade(trade.clone());
    Some(trade)
}

/// Stop or target hit by this bar. The stop wins when both are inside
/// the range. Fills are at the level itself.
pub fn check_triggers(position: &Position, bar: &Bar) -> Option<(ExitReason, f64)> {
    if position.should_stop_loss(bar) {
        Some((ExitReason::StopLoss, position.stop_loss))
    } else if position.should_take_profit(bar) {
        Some((ExitReason::TakeProfit, position.take_profit))
    } else {
        None
    }
}
