//! Open position and closed trade records for the backtest.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use super::ohlcv::Bar;
use super::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    ReversalSignal,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::ReversalSignal => "reversal_signal",
            ExitReason::EndOfData => "end_of_data",
        };
        write!(f, "{}", s)
    }
}

/// A single open position. `direction` is BUY for long and SELL for short.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction: Direction,
    pub size: f64,
    pub entry_price: f64,
    pub entry_index: usize,
    pub entry_timestamp: NaiveDateTime,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Second target, used after a scale-out at `take_profit`.
    pub take_profit_2: f64,
    /// Stop at entry; the basis for R multiples.
    pub initial_stop: f64,
    /// Entry commission not yet attributed to a closed trade.
    pub entry_commission: f64,
    pub scaled_out: bool,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Buy
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Sell
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * self.size * (price - self.entry_price)
    }

    /// Whether the bar's range reached the stop.
    pub fn should_stop_loss(&self, bar: &Bar) -> bool {
        if self.is_long() {
            bar.low <= self.stop_loss
        } else {
            bar.high >= self.stop_loss
        }
    }

    /// Whether the bar's range reached the current target.
    pub fn should_take_profit(&self, bar: &Bar) -> bool {
        if self.is_long() {
            bar.high >= self.take_profit
        } else {
            bar.low <= self.take_profit
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub direction: Direction,
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_timestamp: NaiveDateTime,
    pub exit_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    /// Net of both commissions.
    pub pnl: f64,
    /// pnl relative to entry notional, in percent.
    pub return_pct: f64,
    pub exit_reason: ExitReason,
    /// |entry - initial stop| · size.
    pub initial_risk: f64,
    pub r_multiple: f64,
}

impl Trade {
    pub fn bars_held(&self) -> usize {
        self.exit_index.saturating_sub(self.entry_index)
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}
