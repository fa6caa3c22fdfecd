//! Account state and equity tracking for a single-symbol backtest.
//!
//! Positions are margin-style: opening one books only the entry
//! commission against cash, and realized PnL settles on close. Equity is
//! cash plus the open position's unrealized PnL.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Option<Position>,
    pub closed_trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position: None,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.closed_trades.push(trade);
    }

    pub fn record_equity(&mut self, index: usize, timestamp: NaiveDateTime, equity: f64) {
        self.equity_curve.push(EquityPoint {
            index,
            timestamp,
            equity,
        });
    }

    /// Cash plus unrealized PnL at `price`.
    pub fn total_equity(&self, price: f64) -> f64 {
        self.cash
            + self
                .position
                .as_ref()
                .map_or(0.0, |pos| pos.unrealized_pnl(price))
    }

    /// Sum of closed-trade PnL.
    pub fn realized_pnl(&self) -> f64 {
        self.closed_trades.iter().map(|t| t.pnl).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::Direction;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn make_position() -> Position {
        Position {
            direction: Direction::Buy,
            size: 10.0,
            entry_price: 100.0,
            entry_index: 0,
            entry_timestamp: ts(),
            stop_loss: 95.0,
            take_profit: 110.0,
            take_profit_2: 120.0,
            initial_stop: 95.0,
            entry_commission: 0.0,
            scaled_out: false,
        }
    }

    #[test]
    fn new_portfolio() {
        let p = Portfolio::new(10_000.0);
        assert!((p.cash - 10_000.0).abs() < f64::EPSILON);
        assert!(!p.has_position());
        assert!(p.closed_trades.is_empty());
        assert!(p.equity_curve.is_empty());
    }

    #[test]
    fn equity_includes_unrealized() {
        let mut p = Portfolio::new(10_000.0);
        assert!((p.total_equity(123.0) - 10_000.0).abs() < f64::EPSILON);
        p.position = Some(make_position());
        assert!((p.total_equity(105.0) - 10_050.0).abs() < 1e-9);
        assert!((p.total_equity(90.0) - 9_900.0).abs() < 1e-9);
    }

    #[test]
    fn record_equity_points() {
        let mut p = Portfolio::new(10_000.0);
        p.record_equity(0, ts(), 10_000.0);
        p.record_equity(1, ts() + chrono::Duration::hours(1), 10_100.0);
        assert_eq!(p.equity_curve.len(), 2);
        assert_eq!(p.equity_curve[1].index, 1);
    }
}
