use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::kelly::{BetLimits, KellyError, Outcome};
use crate::core::portfolio::PortfolioAllocation;

fn default_probability() -> f64 {
    0.5
}

/// Binary market as seen by the calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub question: String,
    /// Market-implied P(YES)
    #[serde(default = "default_probability")]
    pub probability: f64,
}

/// Model forecast for a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default = "default_probability")]
    pub probability: f64,
    #[serde(default = "default_probability")]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl Default for Prediction {
    fn default() -> Self {
        Self {
            probability: 0.5,
            confidence: 0.5,
            reasoning: String::new(),
        }
    }
}

/// Candidate market bundled with its forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketWithPrediction {
    pub market: Market,
    #[serde(default)]
    pub prediction: Prediction,
}

/// Existing holding, only its payout matters for portfolio value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub payout: f64,
}

/// How a market resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    Yes,
    No,
    #[serde(alias = "MKT")]
    Cancel,
}

impl Resolution {
    /// Realized value of the YES contract, `None` for cancelled markets
    pub fn outcome_value(self) -> Option<f64> {
        match self {
            Resolution::Yes => Some(1.0),
            Resolution::No => Some(0.0),
            Resolution::Cancel => None,
        }
    }

    /// Whether a bet on `outcome` won
    pub fn pays(self, outcome: Outcome) -> bool {
        matches!(
            (self, outcome),
            (Resolution::Yes, Outcome::Yes) | (Resolution::No, Outcome::No)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Yes => "YES",
            Resolution::No => "NO",
            Resolution::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = KellyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YES" => Ok(Resolution::Yes),
            "NO" => Ok(Resolution::No),
            "CANCEL" | "MKT" => Ok(Resolution::Cancel),
            other => Err(KellyError::InvalidRecord(format!("unknown resolution {}", other))),
        }
    }
}

/// Resolved market with the forecast made before resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalMarket {
    pub id: String,
    #[serde(default)]
    pub question: String,
    /// Creation time in epoch milliseconds
    #[serde(default)]
    pub created_time: Option<i64>,
    #[serde(default)]
    pub close_time: Option<i64>,
    /// Market price when the bet would have been placed
    #[serde(default = "default_probability")]
    pub initial_probability: f64,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub resolution_time: Option<i64>,
    #[serde(default)]
    pub prediction: Prediction,
}

impl HistoricalMarket {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_time.and_then(DateTime::from_timestamp_millis)
    }

    pub fn created_date(&self) -> Option<NaiveDate> {
        self.created_at().map(|t| t.date_naive())
    }

    /// View of the market at entry, without resolution data
    pub fn to_market_with_prediction(&self) -> MarketWithPrediction {
        MarketWithPrediction {
            market: Market {
                id: self.id.clone(),
                question: self.question.clone(),
                probability: self.initial_probability,
            },
            prediction: self.prediction.clone(),
        }
    }
}

/// Kelly fraction request
#[derive(Debug, Serialize, Deserialize)]
pub struct KellyFractionRequest {
    pub model_probability: f64,
    pub market_probability: f64,
    /// "YES" or "NO", case-insensitive
    #[serde(default = "default_outcome")]
    pub outcome: String,
}

fn default_outcome() -> String {
    Outcome::Yes.to_string()
}

/// Kelly fraction response
#[derive(Debug, Serialize, Deserialize)]
pub struct KellyFractionResponse {
    pub outcome: Outcome,
    pub kelly_fraction: f64,
    pub edge: f64,
    /// Expected profit per unit staked
    pub expected_value_per_unit: f64,
}

/// Bet recommendation request
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub markets: Vec<MarketWithPrediction>,
    pub current_balance: f64,
    #[serde(default)]
    pub limits: BetLimits,
}

/// Portfolio allocation request
#[derive(Debug, Serialize, Deserialize)]
pub struct PortfolioRequest {
    #[serde(default)]
    pub current_positions: Vec<Position>,
    pub new_opportunities: Vec<MarketWithPrediction>,
    pub current_balance: f64,
}

pub type PortfolioResponse = PortfolioAllocation;

/// Sharpe ratio request
#[derive(Debug, Serialize, Deserialize)]
pub struct SharpeRequest {
    pub returns: Vec<f64>,
    #[serde(default)]
    pub risk_free_rate: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SharpeResponse {
    pub sharpe_ratio: f64,
}

/// Maximum drawdown request
#[derive(Debug, Serialize, Deserialize)]
pub struct DrawdownRequest {
    pub portfolio_values: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DrawdownResponse {
    pub max_drawdown: f64,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub max_kelly_fraction: f64,
    pub min_edge: f64,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
