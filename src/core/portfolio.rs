//! Portfolio-level Kelly allocation
//!
//! Aggregates per-market recommendations and caps total exposure at 80% of
//! the available balance.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

use super::kelly::{ensure_finite, BetLimits, KellyBet, KellyCriterionCalculator, KellyError};
use crate::models::{MarketWithPrediction, Position};

/// Maximum share of the balance committed across all new bets
pub const MAX_PORTFOLIO_EXPOSURE: f64 = 0.8;

const HIGH_RISK_CONCENTRATION: f64 = 0.5;
const MEDIUM_RISK_CONCENTRATION: f64 = 0.3;

/// Qualitative portfolio risk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_concentration(concentration: f64) -> Self {
        if concentration > HIGH_RISK_CONCENTRATION {
            RiskLevel::High
        } else if concentration > MEDIUM_RISK_CONCENTRATION {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Total recommended stake / balance
    pub portfolio_concentration: f64,
    /// Sum of the bets' expected values
    pub expected_return: f64,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Allocation summary, computed fresh on every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioAllocation {
    pub total_value: f64,
    pub available_balance: f64,
    pub recommended_bets: Vec<KellyBet>,
    pub risk_metrics: RiskMetrics,
}

impl PortfolioAllocation {
    /// Fallback returned when the allocation cannot be computed
    pub fn failed(current_balance: f64, err: &KellyError) -> Self {
        Self {
            total_value: current_balance,
            available_balance: current_balance,
            recommended_bets: Vec::new(),
            risk_metrics: RiskMetrics {
                error: Some(err.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn total_recommended_amount(&self) -> f64 {
        self.recommended_bets.iter().map(|b| b.bet_amount).sum()
    }
}

impl KellyCriterionCalculator {
    /// Recommend new bets given existing positions, with exposure capped at
    /// `MAX_PORTFOLIO_EXPOSURE` of `current_balance`.
    ///
    /// When the cap binds, every bet's amount and fraction are scaled by the
    /// same factor. Expected values are not recomputed after scaling, so
    /// `expected_return` reflects the unscaled stakes.
    ///
    /// Never fails: on error the result carries zeroed metrics and
    /// `risk_metrics.error`.
    pub fn calculate_portfolio_kelly(
        &self,
        current_positions: &[Position],
        new_opportunities: &[MarketWithPrediction],
        current_balance: f64,
    ) -> PortfolioAllocation {
        self.try_portfolio_kelly(current_positions, new_opportunities, current_balance)
            .unwrap_or_else(|e| {
                error!("Error calculating portfolio Kelly: {}", e);
                PortfolioAllocation::failed(current_balance, &e)
            })
    }

    pub fn try_portfolio_kelly(
        &self,
        current_positions: &[Position],
        new_opportunities: &[MarketWithPrediction],
        current_balance: f64,
    ) -> Result<PortfolioAllocation, KellyError> {
        ensure_finite(current_balance, "current_balance")?;
        if current_balance < 0.0 {
            return Err(KellyError::InvalidRecord(format!(
                "negative balance {}",
                current_balance
            )));
        }

        let mut total_value = current_balance;
        for position in current_positions {
            total_value += ensure_finite(position.payout, "position.payout")?;
        }

        let kelly_bets = self.recommend_bets(new_opportunities, current_balance, &BetLimits::default());

        let total_recommended: f64 = kelly_bets.iter().map(|b| b.bet_amount).sum();
        let exposure_cap = current_balance * MAX_PORTFOLIO_EXPOSURE;

        let recommended_bets: Vec<KellyBet> = if total_recommended > exposure_cap {
            let scale_factor = exposure_cap / total_recommended;
            kelly_bets.iter().map(|b| b.scaled(scale_factor)).collect()
        } else {
            kelly_bets
        };

        let mut risk_metrics = RiskMetrics::default();
        if !recommended_bets.is_empty() {
            if current_balance == 0.0 {
                return Err(KellyError::DivisionByZero("current_balance"));
            }

            let total_amount: f64 = recommended_bets.iter().map(|b| b.bet_amount).sum();
            risk_metrics.expected_return = recommended_bets.iter().map(|b| b.expected_value).sum();
            risk_metrics.portfolio_concentration = total_amount / current_balance;
            risk_metrics.risk_level =
                RiskLevel::from_concentration(risk_metrics.portfolio_concentration);
        }

        Ok(PortfolioAllocation {
            total_value,
            available_balance: current_balance,
            recommended_bets,
            risk_metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Market, Prediction};

    fn opportunity(id: &str, market_p: f64, model_p: f64) -> MarketWithPrediction {
        MarketWithPrediction {
            market: Market {
                id: id.to_string(),
                question: String::new(),
                probability: market_p,
            },
            prediction: Prediction {
                probability: model_p,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_concentration(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_concentration(0.3), RiskLevel::Low);
        assert_eq!(RiskLevel::from_concentration(0.31), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_concentration(0.5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_concentration(0.51), RiskLevel::High);
    }

    #[test]
    fn test_total_value_includes_payouts() {
        let calc = KellyCriterionCalculator::default();
        let positions = vec![Position { payout: 25.0 }, Position::default()];
        let allocation = calc.calculate_portfolio_kelly(&positions, &[], 1000.0);

        assert!((allocation.total_value - 1025.0).abs() < 1e-9);
        assert!((allocation.available_balance - 1000.0).abs() < 1e-9);
        assert!(allocation.recommended_bets.is_empty());
        assert_eq!(allocation.risk_metrics.risk_level, RiskLevel::Low);
        assert_eq!(allocation.risk_metrics.expected_return, 0.0);
    }

    #[test]
    fn test_no_rescale_under_cap() {
        let calc = KellyCriterionCalculator::default();
        let opportunities = vec![opportunity("a", 0.5, 0.7)];
        let allocation = calc.calculate_portfolio_kelly(&[], &opportunities, 1000.0);

        // 250 -> clamped to 100, well under the 800 cap
        assert_eq!(allocation.recommended_bets.len(), 1);
        assert!((allocation.recommended_bets[0].bet_amount - 100.0).abs() < 1e-9);
        assert!((allocation.risk_metrics.portfolio_concentration - 0.1).abs() < 1e-9);
        assert!((allocation.risk_metrics.expected_return - 40.0).abs() < 1e-9);
        assert_eq!(allocation.risk_metrics.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_rescale_when_over_cap() {
        let calc = KellyCriterionCalculator::default();
        let opportunities: Vec<_> = (0..4)
            .map(|i| opportunity(&format!("m{}", i), 0.5, 0.7))
            .collect();
        // Each bet: 0.25 * 200 = 50 -> total 200 > 160 cap
        let allocation = calc.calculate_portfolio_kelly(&[], &opportunities, 200.0);

        assert_eq!(allocation.recommended_bets.len(), 4);
        let total = allocation.total_recommended_amount();
        assert!(total <= 160.0 + 1e-9);
        assert!((total - 160.0).abs() < 1e-9);

        for bet in &allocation.recommended_bets {
            assert!((bet.bet_amount - 40.0).abs() < 1e-9);
            assert!((bet.kelly_fraction - 0.2).abs() < 1e-9);
            // EV still reflects the 50 stake: 0.7 * 100 - 50 = 20
            assert!((bet.expected_value - 20.0).abs() < 1e-9);
        }

        assert!((allocation.risk_metrics.expected_return - 80.0).abs() < 1e-9);
        assert!((allocation.risk_metrics.portfolio_concentration - 0.8).abs() < 1e-9);
        assert_eq!(allocation.risk_metrics.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_rescale_keeps_proportions() {
        let calc = KellyCriterionCalculator::default();
        let opportunities = vec![
            opportunity("big", 0.5, 0.7),
            opportunity("small", 0.5, 0.58),
        ];
        // big: 0.25 * 10 = 2.5, small: 0.16 * 10 = 1.6 -> total 4.1 <= 8
        let allocation = calc.calculate_portfolio_kelly(&[], &opportunities, 10.0);
        let big = &allocation.recommended_bets[0];
        let small = &allocation.recommended_bets[1];
        assert!((big.bet_amount / small.bet_amount - 2.5 / 1.6).abs() < 1e-9);

        // Shrinking the balance forces the minimum stakes over the cap
        let allocation = calc.calculate_portfolio_kelly(&[], &opportunities, 1.5);
        assert!(allocation.total_recommended_amount() <= 1.2 + 1e-9);
        let big = &allocation.recommended_bets[0];
        let small = &allocation.recommended_bets[1];
        assert!((big.bet_amount - small.bet_amount).abs() < 1e-9);
    }

    #[test]
    fn test_medium_risk() {
        let calc = KellyCriterionCalculator::default();
        let opportunities = vec![opportunity("a", 0.5, 0.7), opportunity("b", 0.4, 0.6)];
        // 0.25 * 100 = 25 each -> concentration 0.5 is medium (not > 0.5)
        let allocation = calc.calculate_portfolio_kelly(&[], &opportunities, 100.0);
        assert!((allocation.risk_metrics.portfolio_concentration - 0.5).abs() < 1e-9);
        assert_eq!(allocation.risk_metrics.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_zero_balance_falls_back() {
        let calc = KellyCriterionCalculator::default();
        let opportunities = vec![opportunity("a", 0.5, 0.7)];
        let allocation = calc.calculate_portfolio_kelly(&[Position { payout: 5.0 }], &opportunities, 0.0);

        assert!(allocation.recommended_bets.is_empty());
        assert_eq!(allocation.total_value, 0.0);
        assert!(allocation.risk_metrics.error.is_some());
    }

    #[test]
    fn test_invalid_balance_falls_back() {
        let calc = KellyCriterionCalculator::default();
        let opportunities = vec![opportunity("a", 0.5, 0.7)];

        let allocation = calc.calculate_portfolio_kelly(&[], &opportunities, f64::NAN);
        assert!(allocation.risk_metrics.error.is_some());

        let allocation = calc.calculate_portfolio_kelly(&[], &opportunities, -10.0);
        assert!(allocation.recommended_bets.is_empty());
        assert_eq!(allocation.available_balance, -10.0);
        assert!(allocation.risk_metrics.error.is_some());
    }

    #[test]
    fn test_error_field_serialization() {
        let ok = RiskMetrics::default();
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("error"));
        assert!(json.contains("\"risk_level\":\"low\""));

        let failed = PortfolioAllocation::failed(10.0, &KellyError::DivisionByZero("current_balance"));
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("division by zero"));
    }
}
