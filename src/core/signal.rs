//! Trade signal from a forecast vs. market price
//!
//! Coarse BUY/HOLD/AVOID decision with a flat stake scaled by confidence and
//! by the size of the disagreement.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Don't act on markets closing within this window
const CLOSING_SOON_MS: i64 = 24 * 60 * 60 * 1000;

/// Cap on the difference multiplier
const MAX_DIFFERENCE_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Bucket a scalar confidence in [0, 1]
    pub fn from_score(score: f64) -> Self {
        if score < 0.45 {
            ConfidenceLevel::Low
        } else if score < 0.75 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::High
        }
    }

    pub fn score(self) -> f64 {
        match self {
            ConfidenceLevel::Low => 0.3,
            ConfidenceLevel::Medium => 0.6,
            ConfidenceLevel::High => 0.9,
        }
    }

    fn stake_multiplier(self) -> f64 {
        match self {
            ConfidenceLevel::Low => 0.5,
            ConfidenceLevel::Medium => 1.0,
            ConfidenceLevel::High => 1.5,
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    BuyYes,
    BuyNo,
    Hold,
    Avoid,
}

impl TradeAction {
    pub fn is_trade(self) -> bool {
        matches!(self, TradeAction::BuyYes | TradeAction::BuyNo)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeAction::BuyYes => "BUY_YES",
            TradeAction::BuyNo => "BUY_NO",
            TradeAction::Hold => "HOLD",
            TradeAction::Avoid => "AVOID",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Minimum |model - market| to trade
    pub confidence_threshold: f64,
    pub default_bet_amount: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.15,
            default_bet_amount: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub action: TradeAction,
    pub bet_amount: Option<f64>,
    /// model - market
    pub difference: f64,
    pub reasoning: String,
}

/// Decide what to do with a market
///
/// # Arguments
/// * `model_probability` - Forecast P(YES)
/// * `market_probability` - Current market P(YES)
/// * `confidence` - Forecast confidence
/// * `close_time_ms` - Market close time (epoch ms), if known
/// * `now_ms` - Current time (epoch ms)
pub fn determine_action(
    config: &SignalConfig,
    model_probability: f64,
    market_probability: f64,
    confidence: ConfidenceLevel,
    close_time_ms: Option<i64>,
    now_ms: i64,
) -> TradeSignal {
    let difference = model_probability - market_probability;
    let abs_diff = difference.abs();

    let no_trade = |action, reasoning: String| TradeSignal {
        action,
        bet_amount: None,
        difference,
        reasoning,
    };

    if confidence == ConfidenceLevel::Low {
        return no_trade(TradeAction::Avoid, "Forecast confidence is too low".to_string());
    }

    if let Some(close) = close_time_ms {
        if close < now_ms + CLOSING_SOON_MS {
            return no_trade(TradeAction::Avoid, "Market closes too soon".to_string());
        }
    }

    if abs_diff.is_nan() || abs_diff < config.confidence_threshold {
        return no_trade(
            TradeAction::Hold,
            format!(
                "Difference ({:.3}) below threshold ({})",
                abs_diff, config.confidence_threshold
            ),
        );
    }

    let difference_multiplier = (abs_diff * 3.0).min(MAX_DIFFERENCE_MULTIPLIER);
    let amount = config.default_bet_amount * confidence.stake_multiplier() * difference_multiplier;
    let amount = (amount * 100.0).round() / 100.0;

    let action = if difference > 0.0 {
        TradeAction::BuyYes
    } else {
        TradeAction::BuyNo
    };

    TradeSignal {
        action,
        bet_amount: Some(amount),
        difference,
        reasoning: format!(
            "Model predicts {:.1}% vs market {:.1}% ({:+.1}%)",
            model_probability * 100.0,
            market_probability * 100.0,
            difference * 100.0
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;
    const NEXT_WEEK: i64 = NOW + 7 * CLOSING_SOON_MS;

    #[test]
    fn test_confidence_buckets() {
        assert_eq!(ConfidenceLevel::from_score(0.3), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.5), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.9), ConfidenceLevel::High);
        for level in [ConfidenceLevel::Low, ConfidenceLevel::Medium, ConfidenceLevel::High] {
            assert_eq!(ConfidenceLevel::from_score(level.score()), level);
        }
    }

    #[test]
    fn test_low_confidence_avoids() {
        let signal = determine_action(
            &SignalConfig::default(),
            0.9,
            0.3,
            ConfidenceLevel::Low,
            Some(NEXT_WEEK),
            NOW,
        );
        assert_eq!(signal.action, TradeAction::Avoid);
        assert!(signal.bet_amount.is_none());
    }

    #[test]
    fn test_closing_soon_avoids() {
        let signal = determine_action(
            &SignalConfig::default(),
            0.9,
            0.3,
            ConfidenceLevel::High,
            Some(NOW + 3_600_000),
            NOW,
        );
        assert_eq!(signal.action, TradeAction::Avoid);
    }

    #[test]
    fn test_small_difference_holds() {
        let signal = determine_action(
            &SignalConfig::default(),
            0.55,
            0.5,
            ConfidenceLevel::High,
            None,
            NOW,
        );
        assert_eq!(signal.action, TradeAction::Hold);
        assert!(!signal.action.is_trade());
    }

    #[test]
    fn test_buy_yes_amount() {
        let signal = determine_action(
            &SignalConfig::default(),
            0.7,
            0.5,
            ConfidenceLevel::Medium,
            Some(NEXT_WEEK),
            NOW,
        );
        assert_eq!(signal.action, TradeAction::BuyYes);
        // 10 * 1.0 * min(0.6, 2.0) = 6.0
        assert!((signal.bet_amount.unwrap() - 6.0).abs() < 1e-9);
        assert!(signal.reasoning.contains("+20.0%"));
    }

    #[test]
    fn test_buy_no_amount_capped() {
        let signal = determine_action(
            &SignalConfig::default(),
            0.05,
            0.95,
            ConfidenceLevel::High,
            None,
            NOW,
        );
        assert_eq!(signal.action, TradeAction::BuyNo);
        // 10 * 1.5 * 2.0 (capped) = 30
        assert!((signal.bet_amount.unwrap() - 30.0).abs() < 1e-9);
        assert!(signal.difference < 0.0);
    }

    #[test]
    fn test_action_serialization() {
        assert_eq!(
            serde_json::to_string(&TradeAction::BuyYes).unwrap(),
            "\"BUY_YES\""
        );
        assert_eq!(TradeAction::Hold.to_string(), "HOLD");
    }
}
