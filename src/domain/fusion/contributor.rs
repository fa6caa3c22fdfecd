//! Per-family votes.
//!
//! Each indicator family looks at the frame at one bar and either abstains
//! (`None`, its inputs are undefined) or casts a [`Vote`]. A bullish or
//! bearish vote always carries a reason; a neutral vote carries none.

use super::FusionConfig;
use crate::domain::indicator::{IndicatorFrame, IndicatorValue, SwingTrend};
use std::fmt;

/// Relative tolerance for price comparisons.
const PRICE_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Rsi,
    Macd,
    Bollinger,
    Fibonacci,
    Volume,
    Divergence,
}

impl Family {
    /// Evaluation order. Reasons are reported in this order.
    pub const ALL: [Family; 6] = [
        Family::Rsi,
        Family::Macd,
        Family::Bollinger,
        Family::Fibonacci,
        Family::Volume,
        Family::Divergence,
    ];

    pub fn vote(self, frame: &IndicatorFrame<'_>, index: usize, config: &FusionConfig) -> Option<Vote> {
        match self {
            Family::Rsi => rsi_vote(frame, index),
            Family::Macd => macd_vote(frame, index),
            Family::Bollinger => bollinger_vote(frame, index),
            Family::Fibonacci => fibonacci_vote(frame, index, config.fib_proximity_pct),
            Family::Volume => volume_vote(frame, index, config.volume_spike),
            Family::Divergence => divergence_vote(frame, index),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Rsi => "rsi",
            Family::Macd => "macd",
            Family::Bollinger => "bollinger",
            Family::Fibonacci => "fibonacci",
            Family::Volume => "volume",
            Family::Divergence => "divergence",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    pub fn score(self) -> f64 {
        match self {
            Bias::Bullish => 1.0,
            Bias::Bearish => -1.0,
            Bias::Neutral => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub bias: Bias,
    pub reason: Option<String>,
}

impl Vote {
    fn bullish(reason: String) -> Self {
        Vote {
            bias: Bias::Bullish,
            reason: Some(reason),
        }
    }

    fn bearish(reason: String) -> Self {
        Vote {
            bias: Bias::Bearish,
            reason: Some(reason),
        }
    }

    fn neutral() -> Self {
        Vote {
            bias: Bias::Neutral,
            reason: None,
        }
    }
}

fn eps(price: f64) -> f64 {
    price.abs() * PRICE_EPS
}

fn rsi_vote(frame: &IndicatorFrame<'_>, index: usize) -> Option<Vote> {
    let rsi = frame.rsi(index)?;
    let oversold = frame.config().rsi_oversold;
    let overbought = frame.config().rsi_overbought;
    let prev = index.checked_sub(1).and_then(|p| frame.rsi(p));

    let vote = match prev {
        Some(p) if p < oversold && rsi >= oversold => {
            Vote::bullish(format!("RSI rising through {}", oversold))
        }
        Some(p) if p > overbought && rsi <= overbought => {
            Vote::bearish(format!("RSI falling through {}", overbought))
        }
        _ if rsi < oversold => Vote::bullish(format!("RSI oversold ({:.1})", rsi)),
        _ if rsi > overbought => Vote::bearish(format!("RSI overbought ({:.1})", rsi)),
        _ => Vote::neutral(),
    };
    Some(vote)
}

fn macd_vote(frame: &IndicatorFrame<'_>, index: usize) -> Option<Vote> {
    let (line, signal, _) = frame.macd(index)?;
    let Some((prev_line, prev_signal, _)) = index.checked_sub(1).and_then(|p| frame.macd(p)) else {
        return Some(Vote::neutral());
    };

    let tol = eps(line.abs().max(signal.abs()).max(1.0));
    let vote = if line - signal > tol && prev_line - prev_signal <= tol {
        Vote::bullish("MACD bullish cross".to_string())
    } else if signal - line > tol && prev_signal - prev_line <= tol {
        Vote::bearish("MACD bearish cross".to_string())
    } else {
        Vote::neutral()
    };
    Some(vote)
}

fn bollinger_vote(frame: &IndicatorFrame<'_>, index: usize) -> Option<Vote> {
    let IndicatorValue::Bollinger {
        upper,
        lower,
        squeeze,
        ..
    } = frame.bollinger(index)?
    else {
        return None;
    };
    let close = frame.bar(index)?.close;
    let suffix = if *squeeze { " during squeeze" } else { "" };

    let vote = if close < lower - eps(close) {
        Vote::bullish(format!("price below lower Bollinger band{}", suffix))
    } else if close > upper + eps(close) {
        Vote::bearish(format!("price above upper Bollinger band{}", suffix))
    } else {
        Vote::neutral()
    };
    Some(vote)
}

fn fibonacci_vote(frame: &IndicatorFrame<'_>, index: usize, proximity_pct: f64) -> Option<Vote> {
    let fib = frame.fibonacci(index)?;
    let close = frame.bar(index)?.close;
    if fib.range() <= eps(close) {
        return Some(Vote::neutral());
    }

    let nearest = fib
        .iter()
        .map(|(ratio, level)| (ratio, (close - level).abs() / close * 100.0))
        .min_by(|a, b| a.1.total_cmp(&b.1));
    let Some((ratio, distance)) = nearest.filter(|(_, d)| *d <= proximity_pct) else {
        return Some(Vote::neutral());
    };

    let vote = match fib.trend {
        SwingTrend::Up => Vote::bullish(format!(
            "price near support {:.1}% retracement within {:.2}%",
            ratio * 100.0,
            distance
        )),
        SwingTrend::Down => Vote::bearish(format!(
            "price near resistance {:.1}% retracement within {:.2}%",
            ratio * 100.0,
            distance
        )),
    };
    Some(vote)
}

fn volume_vote(frame: &IndicatorFrame<'_>, index: usize, spike: f64) -> Option<Vote> {
    let ratio = frame.volume_ratio(index)?;
    let bar = frame.bar(index)?;
    if ratio <= spike {
        return Some(Vote::neutral());
    }
    let vote = if bar.is_bullish() {
        Vote::bullish(format!("volume > {}x average on up bar ({:.2}x)", spike, ratio))
    } else if bar.is_bearish() {
        Vote::bearish(format!("volume > {}x average on down bar ({:.2}x)", spike, ratio))
    } else {
        Vote::neutral()
    };
    Some(vote)
}

fn divergence_vote(frame: &IndicatorFrame<'_>, index: usize) -> Option<Vote> {
    let lookback = frame.config().divergence_lookback;
    let past = index.checked_sub(lookback)?;
    let rsi_now = frame.rsi(index)?;
    let rsi_then = frame.rsi(past)?;
    let close_now = frame.bar(index)?.close;
    let close_then = frame.bar(past)?.close;

    let tol = eps(close_now);
    let vote = if close_now < close_then - tol && rsi_now > rsi_then {
        Vote::bullish(format!("bullish RSI divergence over {} bars", lookback))
    } else if close_now > close_then + tol && rsi_now < rsi_then {
        Vote::bearish(format!("bearish RSI divergence over {} bars", lookback))
    } else {
        Vote::neutral()
    };
    Some(vote)
}
