//! Kelly Criterion Bet Sizing
//!
//! Optimal stake sizing on binary prediction markets from a model probability
//! and the market-implied probability.
//!
//! The Kelly criterion formula:
//!     f* = (b*p - q) / b
//!
//! Where:
//!     f* = fraction of bankroll to bet
//!     b = (1 / market_p) - 1 (net odds implied by the market price)
//!     p = probability of winning the chosen side
//!     q = 1 - p (probability of losing)
//!
//! Betting NO complements both probabilities first, so the formula always
//! evaluates the side being bought.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::MarketWithPrediction;

/// Reasons a Kelly computation has no meaningful value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KellyError {
    #[error("non-finite input: {0}")]
    NonFiniteInput(&'static str),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("unknown outcome: {0}")]
    UnknownOutcome(String),

    #[error("division by zero: {0}")]
    DivisionByZero(&'static str),

    #[error("computation produced a non-finite value")]
    NonFiniteResult,
}

pub(crate) fn ensure_finite(value: f64, name: &'static str) -> Result<f64, KellyError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(KellyError::NonFiniteInput(name))
    }
}

/// Side of a binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// Both sides, in evaluation order
    pub const BOTH: [Outcome; 2] = [Outcome::Yes, Outcome::No];

    /// Map YES-probabilities onto (p_win, market_p) for this side
    pub fn side_probabilities(self, model_probability: f64, market_probability: f64) -> (f64, f64) {
        match self {
            Outcome::Yes => (model_probability, market_probability),
            Outcome::No => (1.0 - model_probability, 1.0 - market_probability),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Yes => "YES",
            Outcome::No => "NO",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = KellyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YES" => Ok(Outcome::Yes),
            "NO" => Ok(Outcome::No),
            other => Err(KellyError::UnknownOutcome(other.to_string())),
        }
    }
}

/// Bet recommendation for one side of one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KellyBet {
    pub market_id: String,
    pub question: String,
    pub outcome: Outcome,
    pub kelly_fraction: f64,     // Capped Kelly fraction
    pub bet_amount: f64,         // Stake after min/max clamping
    pub market_probability: f64, // Market-implied P(YES)
    pub model_probability: f64,  // Model estimate of P(YES)
    pub expected_value: f64,     // For `bet_amount` at the time of sizing
    pub confidence: f64,
    pub reasoning: String,
}

impl KellyBet {
    /// New record with stake and fraction multiplied by `factor`.
    ///
    /// `expected_value` is carried over unchanged.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            kelly_fraction: self.kelly_fraction * factor,
            bet_amount: self.bet_amount * factor,
            ..self.clone()
        }
    }
}

/// Bounds applied when turning fractions into stakes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetLimits {
    pub max_simultaneous_bets: usize,
    pub min_bet_amount: f64,
    pub max_bet_amount: f64,
}

impl Default for BetLimits {
    fn default() -> Self {
        Self {
            max_simultaneous_bets: 5,
            min_bet_amount: 1.0,
            max_bet_amount: 100.0,
        }
    }
}

/// Kelly criterion calculator for prediction markets
///
/// Read-only after construction, so a single instance can be shared
/// across threads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KellyCriterionCalculator {
    /// Safety cap on the fraction of bankroll staked on one bet
    pub max_kelly_fraction: f64,
    /// Minimum |p - market_p| for a bet to be considered
    pub min_edge: f64,
}

impl KellyCriterionCalculator {
    pub fn new(max_kelly_fraction: f64, min_edge: f64) -> Self {
        Self {
            max_kelly_fraction,
            min_edge,
        }
    }

    /// Kelly fraction for betting `outcome`, in `[0, max_kelly_fraction]`.
    ///
    /// Returns 0.0 when the market price is degenerate, when the edge is
    /// below `min_edge`, or when the inputs cannot be evaluated.
    ///
    /// # Examples
    /// ```
    /// use forecast_kelly::core::kelly::{KellyCriterionCalculator, Outcome};
    /// let calc = KellyCriterionCalculator::new(0.25, 0.05);
    /// // Raw Kelly is 0.4, capped at 0.25
    /// let f = calc.calculate_kelly_fraction(0.7, 0.5, Outcome::Yes);
    /// assert!((f - 0.25).abs() < 1e-12);
    /// ```
    pub fn calculate_kelly_fraction(
        &self,
        model_probability: f64,
        market_probability: f64,
        outcome: Outcome,
    ) -> f64 {
        self.try_kelly_fraction(model_probability, market_probability, outcome)
            .unwrap_or_else(|e| {
                error!("Error calculating Kelly fraction: {}", e);
                0.0
            })
    }

    pub fn try_kelly_fraction(
        &self,
        model_probability: f64,
        market_probability: f64,
        outcome: Outcome,
    ) -> Result<f64, KellyError> {
        ensure_finite(model_probability, "model_probability")?;
        ensure_finite(market_probability, "market_probability")?;

        let (p, market_p) = outcome.side_probabilities(model_probability, market_probability);

        // Odds are undefined at the boundary
        if market_p <= 0.0 || market_p >= 1.0 {
            return Ok(0.0);
        }

        let q = 1.0 - p;
        let b = (1.0 / market_p) - 1.0;
        let raw = (b * p - q) / b;
        if !raw.is_finite() {
            return Err(KellyError::NonFiniteResult);
        }

        let fraction = raw.max(0.0).min(self.max_kelly_fraction);

        let edge = p - market_p;
        if edge.abs() < self.min_edge {
            return Ok(0.0);
        }

        Ok(fraction)
    }

    /// Expected profit of staking `bet_amount` on `outcome`.
    ///
    /// A winning bet pays `bet_amount / market_p`, principal included.
    pub fn calculate_expected_value(
        &self,
        model_probability: f64,
        market_probability: f64,
        bet_amount: f64,
        outcome: Outcome,
    ) -> f64 {
        self.try_expected_value(model_probability, market_probability, bet_amount, outcome)
            .unwrap_or_else(|e| {
                error!("Error calculating expected value: {}", e);
                0.0
            })
    }

    pub fn try_expected_value(
        &self,
        model_probability: f64,
        market_probability: f64,
        bet_amount: f64,
        outcome: Outcome,
    ) -> Result<f64, KellyError> {
        ensure_finite(model_probability, "model_probability")?;
        ensure_finite(market_probability, "market_probability")?;
        ensure_finite(bet_amount, "bet_amount")?;

        let (p_win, market_p) = outcome.side_probabilities(model_probability, market_probability);
        if market_p <= 0.0 || market_p >= 1.0 {
            return Ok(0.0);
        }

        let payout_if_win = bet_amount / market_p;
        let expected_value = p_win * payout_if_win - bet_amount;
        if !expected_value.is_finite() {
            return Err(KellyError::NonFiniteResult);
        }

        Ok(expected_value)
    }

    /// Recommend bets across markets, best expected value first.
    ///
    /// Both sides of every market are evaluated. A side is kept only if its
    /// Kelly fraction is positive and the expected value at the clamped
    /// stake is positive. Markets that cannot be evaluated are skipped.
    pub fn recommend_bets(
        &self,
        markets_with_predictions: &[MarketWithPrediction],
        current_balance: f64,
        limits: &BetLimits,
    ) -> Vec<KellyBet> {
        let mut recommended = Vec::new();

        for entry in markets_with_predictions {
            match self.recommend_for_market(entry, current_balance, limits) {
                Ok(bets) => recommended.extend(bets),
                Err(e) => {
                    warn!(
                        "Error processing market {:?} for Kelly recommendation: {}",
                        entry.market.id, e
                    );
                }
            }
        }

        recommended.sort_by(|a, b| {
            b.expected_value
                .partial_cmp(&a.expected_value)
                .unwrap_or(Ordering::Equal)
        });
        recommended.truncate(limits.max_simultaneous_bets);
        recommended
    }

    fn recommend_for_market(
        &self,
        entry: &MarketWithPrediction,
        current_balance: f64,
        limits: &BetLimits,
    ) -> Result<Vec<KellyBet>, KellyError> {
        let market = &entry.market;
        let prediction = &entry.prediction;

        ensure_finite(current_balance, "current_balance")?;
        if !(0.0..=1.0).contains(&market.probability) {
            return Err(KellyError::InvalidRecord(format!(
                "market probability {} outside [0, 1]",
                market.probability
            )));
        }

        let mut bets = Vec::with_capacity(2);
        for outcome in Outcome::BOTH {
            let kelly_fraction =
                self.try_kelly_fraction(prediction.probability, market.probability, outcome)?;
            if kelly_fraction <= 0.0 {
                continue;
            }

            let bet_amount = (kelly_fraction * current_balance)
                .min(limits.max_bet_amount)
                .max(limits.min_bet_amount);

            // Re-check against the clamped stake
            let expected_value = self.try_expected_value(
                prediction.probability,
                market.probability,
                bet_amount,
                outcome,
            )?;
            if expected_value <= 0.0 {
                continue;
            }

            bets.push(KellyBet {
                market_id: market.id.clone(),
                question: market.question.clone(),
                outcome,
                kelly_fraction,
                bet_amount,
                market_probability: market.probability,
                model_probability: prediction.probability,
                expected_value,
                confidence: prediction.confidence,
                reasoning: format!("{} bet: {}", outcome, prediction.reasoning),
            });
        }

        Ok(bets)
    }
}

impl Default for KellyCriterionCalculator {
    fn default() -> Self {
        Self::new(0.25, 0.05)
    }
}
