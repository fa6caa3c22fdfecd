//! Signal fusion: combine per-family indicator votes into one [`Signal`].
//!
//! Net score = Σ wᵢ·sᵢ / Σ wᵢ over the families that did not abstain, with
//! sᵢ ∈ {+1, 0, -1}. BUY at or above the threshold, SELL at or below its
//! negation, NEUTRAL otherwise. Confidence is |score|, raised with
//! diminishing returns when three or more families agree.
//!
//! The engine holds configuration only; `evaluate` is a pure function of
//! the frame and the index.

pub mod contributor;
pub mod price_levels;

pub use contributor::{Bias, Family, Vote};
pub use price_levels::{compute_levels, PriceLevels};

use crate::domain::error::OrderPointError;
use crate::domain::indicator::IndicatorFrame;
use crate::domain::signal::{Direction, Signal};

/// Agreeing families needed before the confidence boost applies.
const MIN_AGREEING_FOR_BOOST: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct FamilyWeights {
    pub rsi: f64,
    pub macd: f64,
    pub bollinger: f64,
    pub fibonacci: f64,
    pub volume: f64,
    pub divergence: f64,
}

impl Default for FamilyWeights {
    fn default() -> Self {
        FamilyWeights {
            rsi: 1.0,
            macd: 1.0,
            bollinger: 1.0,
            fibonacci: 1.0,
            volume: 1.0,
            divergence: 1.0,
        }
    }
}

impl FamilyWeights {
    pub fn weight(&self, family: Family) -> f64 {
        match family {
            Family::Rsi => self.rsi,
            Family::Macd => self.macd,
            Family::Bollinger => self.bollinger,
            Family::Fibonacci => self.fibonacci,
            Family::Volume => self.volume,
            Family::Divergence => self.divergence,
        }
    }
}

/// Stop floor and reward multiples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskConfig {
    /// Minimum stop distance, percent of close.
    pub stop_loss_floor_pct: f64,
    pub take_profit_1_rr: f64,
    pub take_profit_2_rr: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            stop_loss_floor_pct: 1.0,
            take_profit_1_rr: 1.5,
            take_profit_2_rr: 3.0,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), OrderPointError> {
        const SECTION: &str = "risk";
        if !(self.stop_loss_floor_pct > 0.0 && self.stop_loss_floor_pct < 100.0) {
            return Err(OrderPointError::invalid(
                SECTION,
                "stop_loss_floor_pct",
                "must be between 0 and 100 (exclusive)",
            ));
        }
        if !(self.take_profit_1_rr > 0.0) {
            return Err(OrderPointError::invalid(
                SECTION,
                "take_profit_1_rr",
                "must be positive",
            ));
        }
        if !(self.take_profit_2_rr >= self.take_profit_1_rr) {
            return Err(OrderPointError::invalid(
                SECTION,
                "take_profit_2_rr",
                "must be at least take_profit_1_rr",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    pub signal_threshold: f64,
    /// Minimum confidence for a signal to be acted on or notified.
    pub min_confidence: f64,
    pub agreement_boost: f64,
    /// Volume ratio above which the volume family fires.
    pub volume_spike: f64,
    /// Distance to a Fibonacci level, percent of close, that counts as "near".
    pub fib_proximity_pct: f64,
    pub entry_atr_mult: f64,
    pub fallback_stop_atr_mult: f64,
    pub weights: FamilyWeights,
    pub risk: RiskConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            signal_threshold: 0.3,
            min_confidence: 0.3,
            agreement_boost: 0.15,
            volume_spike: 1.5,
            fib_proximity_pct: 0.5,
            entry_atr_mult: 0.5,
            fallback_stop_atr_mult: 2.0,
            weights: FamilyWeights::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), OrderPointError> {
        const SECTION: &str = "fusion";
        if !(self.signal_threshold > 0.0 && self.signal_threshold <= 1.0) {
            return Err(OrderPointError::invalid(
                SECTION,
                "signal_threshold",
                "must be in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(OrderPointError::invalid(
                SECTION,
                "min_confidence",
                "must be in [0, 1]",
            ));
        }
        if !(0.0..1.0).contains(&self.agreement_boost) {
            return Err(OrderPointError::invalid(
                SECTION,
                "agreement_boost",
                "must be in [0, 1)",
            ));
        }
        let positive = [
            ("volume_spike", self.volume_spike),
            ("fib_proximity_pct", self.fib_proximity_pct),
        ];
        for (key, value) in positive {
            if !(value > 0.0) {
                return Err(OrderPointError::invalid(SECTION, key, "must be positive"));
            }
        }
        if !(self.entry_atr_mult >= 0.0) {
            return Err(OrderPointError::invalid(
                SECTION,
                "entry_atr_mult",
                "must not be negative",
            ));
        }
        if !(self.fallback_stop_atr_mult > self.entry_atr_mult) {
            return Err(OrderPointError::invalid(
                SECTION,
                "fallback_stop_atr_mult",
                "must be greater than entry_atr_mult",
            ));
        }
        let mut total = 0.0;
        for family in Family::ALL {
            let w = self.weights.weight(family);
            if !(w >= 0.0 && w.is_finite()) {
                return Err(OrderPointError::invalid(
                    SECTION,
                    &format!("weight_{}", family),
                    "must be a non-negative number",
                ));
            }
            total += w;
        }
        if total <= 0.0 {
            return Err(OrderPointError::invalid(
                SECTION,
                "weight_rsi",
                "at least one family weight must be positive",
            ));
        }
        self.risk.validate()
    }
}

/// Stateless evaluator over an [`IndicatorFrame`].
#[derive(Debug, Clone)]
pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Result<Self, OrderPointError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Every family's vote at `index`, in [`Family::ALL`] order.
    pub fn votes(&self, frame: &IndicatorFrame<'_>, index: usize) -> Vec<(Family, Option<Vote>)> {
        Family::ALL
            .iter()
            .map(|&family| (family, family.vote(frame, index, &self.config)))
            .collect()
    }

    /// Fuse the votes at `index` into a signal. `None` when `index` is
    /// outside the frame's bar series.
    pub fn evaluate(&self, frame: &IndicatorFrame<'_>, index: usize) -> Option<Signal> {
        let bar = frame.bar(index)?;
        let votes = self.votes(frame, index);

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (family, vote) in &votes {
            let Some(vote) = vote else { continue };
            let w = self.config.weights.weight(*family);
            weighted += w * vote.bias.score();
            total_weight += w;
        }
        if total_weight <= 0.0 {
            return Some(Signal::neutral(index, bar.timestamp, bar.close));
        }

        let score = (weighted / total_weight).clamp(-1.0, 1.0);
        let direction = if score >= self.config.signal_threshold {
            Direction::Buy
        } else if score <= -self.config.signal_threshold {
            Direction::Sell
        } else {
            Direction::Neutral
        };

        let agreeing = match direction {
            Direction::Buy => Bias::Bullish,
            Direction::Sell => Bias::Bearish,
            Direction::Neutral => Bias::Neutral,
        };
        let mut reasons = Vec::new();
        let mut agree_count = 0;
        for (family, vote) in &votes {
            let Some(vote) = vote else { continue };
            if self.config.weights.weight(*family) <= 0.0 {
                continue;
            }
            let Some(reason) = &vote.reason else { continue };
            if direction == Direction::Neutral || vote.bias == agreeing {
                reasons.push(reason.clone());
            }
            if direction != Direction::Neutral && vote.bias == agreeing {
                agree_count += 1;
            }
        }

        let confidence = if direction == Direction::Neutral {
            score.abs()
        } else {
            boosted_confidence(score.abs(), agree_count, self.config.agreement_boost)
        };

        let levels = compute_levels(frame, index, direction, &self.config);
        Some(Signal {
            direction,
            confidence,
            score,
            close: bar.close,
            entry_low: levels.entry_low,
            entry_high: levels.entry_high,
            stop_loss: levels.stop_loss,
            take_profit_1: levels.take_profit_1,
            take_profit_2: levels.take_profit_2,
            contributing_reasons: reasons,
            index,
            timestamp: bar.timestamp,
        })
    }
}

/// 1 - (1 - base)·(1 - boost)^(n - 2) for n ≥ 3 agreeing families.
fn boosted_confidence(base: f64, agreeing: usize, boost: f64) -> f64 {
    if agreeing < MIN_AGREEING_FOR_BOOST {
        return base.clamp(0.0, 1.0);
    }
    let extra = (agreeing - 2) as i32;
    (1.0 - (1.0 - base) * (1.0 - boost).powi(extra)).clamp(0.0, 1.0)
}
