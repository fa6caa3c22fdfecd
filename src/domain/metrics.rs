//! Performance metrics and statistics.
//!
//! Returns are per bar; annualisation uses the series timeframe's
//! periods per year (markets trade around the clock).

use serde::Serialize;

use super::portfolio::{EquityPoint, Portfolio};
use super::position::Trade;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of bars below a prior equity peak.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_bars_held: f64,
    /// Mean realized R multiple.
    pub avg_risk_reward: f64,
    pub final_equity: f64,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, periods_per_year: f64, risk_free_rate: f64) -> Self {
        let curve = &portfolio.equity_curve;
        let capital = portfolio.initial_capital;
        let final_equity = curve.last().map_or(capital, |p| p.equity);

        let total_return = if capital > 0.0 {
            final_equity / capital - 1.0
        } else {
            0.0
        };
        let years = curve.len() as f64 / periods_per_year;
        let annualized_return = match total_return {
            r if years > 0.0 && r.is_finite() && r > -1.0 => (1.0 + r).powf(1.0 / years) - 1.0,
            _ => 0.0,
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(curve);
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(curve, risk_free_rate / periods_per_year, periods_per_year);

        let stats = TradeStats::collect(&portfolio.closed_trades);
        let n = stats.count as f64;
        let mean_over = |total: f64, count: usize| if count > 0 { total / count as f64 } else { 0.0 };

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades: stats.count,
            trades_won: stats.won,
            trades_lost: stats.lost,
            trades_breakeven: stats.count - stats.won - stats.lost,
            win_rate: if n > 0.0 { stats.won as f64 / n } else { 0.0 },
            profit_factor: stats.profit_factor(),
            avg_win: mean_over(stats.gross_profit, stats.won),
            avg_loss: mean_over(stats.gross_loss, stats.lost),
            largest_win: stats.largest_win,
            largest_loss: stats.largest_loss,
            avg_bars_held: mean_over(stats.bars_held as f64, stats.count),
            avg_risk_reward: mean_over(stats.r_total, stats.count),
            final_equity,
        }
    }
}

/// Running totals over closed trades. Losses are kept as magnitudes.
#[derive(Debug, Default)]
struct TradeStats {
    count: usize,
    won: usize,
    lost: usize,
    gross_profit: f64,
    gross_loss: f64,
    largest_win: f64,
    largest_loss: f64,
    bars_held: usize,
    r_total: f64,
}

impl TradeStats {
    fn collect(trades: &[Trade]) -> Self {
        trades.iter().fold(Self::default(), |mut s, t| {
            s.count += 1;
            s.bars_held += t.bars_held();
            s.r_total += t.r_multiple;
            if t.pnl > 0.0 {
                s.won += 1;
                s.gross_profit += t.pnl;
                s.largest_win = s.largest_win.max(t.pnl);
            } else if t.pnl < 0.0 {
                s.lost += 1;
                s.gross_loss -= t.pnl;
                s.largest_loss = s.largest_loss.max(-t.pnl);
            }
            s
        })
    }

    /// Infinite when there are profits but no losses.
    fn profit_factor(&self) -> f64 {
        match (self.gross_profit > 0.0, self.gross_loss > 0.0) {
            (_, true) => self.gross_profit / self.gross_loss,
            (true, false) => f64::INFINITY,
            (false, false) => 0.0,
        }
    }
}

/// (max drawdown fraction, longest drawdown in bars)
fn compute_drawdown(curve: &[EquityPoint]) -> (f64, usize) {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    let mut run = 0usize;
    let mut longest = 0usize;

    for equity in curve.iter().map(|p| p.equity) {
        if equity > peak {
            peak = equity;
            run = 0;
            continue;
        }
        if peak > 0.0 && equity < peak {
            worst = worst.max(1.0 - equity / peak);
            run += 1;
            longest = longest.max(run);
        }
    }

    (worst, longest)
}

/// Per-bar simple returns of the equity curve.
fn bar_returns(curve: &[EquityPoint]) -> Vec<f64> {
    curve
        .windows(2)
        .map(|w| match w[0].equity {
            prev if prev > 0.0 => w[1].equity / prev - 1.0,
            _ => 0.0,
        })
        .collect()
}

/// Annualised (Sharpe, Sortino) from per-bar returns.
fn compute_risk_adjusted(curve: &[EquityPoint], period_rf: f64, periods_per_year: f64) -> (f64, f64) {
    let returns = bar_returns(curve);
    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let excess = mean - period_rf;
    let deviation = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let downside = (returns
        .iter()
        .map(|r| (r - period_rf).min(0.0).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let annualise = |risk: f64| {
        if risk > 0.0 {
            excess / risk * periods_per_year.sqrt()
        } else {
            0.0
        }
    };
    (annualise(deviation), annualise(downside))
}
