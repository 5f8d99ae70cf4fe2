//! Forecast Kelly - position sizing for binary prediction markets
//!
//! This library provides:
//! - Kelly criterion bet sizing for YES/NO positions
//! - Multi-market recommendations and portfolio allocation under an exposure cap
//! - Sharpe ratio, maximum drawdown and Brier score
//! - Deterministic replay of resolved markets
//! - JSON/CSV loading and a read-only Manifold Markets client
//!
//! # Example
//!
//! ```
//! use forecast_kelly::{BetLimits, KellyCriterionCalculator, Market, MarketWithPrediction, Prediction};
//!
//! let calc = KellyCriterionCalculator::default();
//! let markets = vec![MarketWithPrediction {
//!     market: Market {
//!         id: "m1".to_string(),
//!         question: "Will it rain tomorrow?".to_string(),
//!         probability: 0.4,
//!     },
//!     prediction: Prediction {
//!         probability: 0.6,
//!         ..Default::default()
//!     },
//! }];
//!
//! let bets = calc.recommend_bets(&markets, 1000.0, &BetLimits::default());
//! println!("Recommended stake: {:.2}", bets[0].bet_amount);
//! ```

pub mod backtesting;
pub mod config;
pub mod core;
pub mod data;
pub mod models;

#[cfg(feature = "manifold")]
pub mod manifold;

// API-specific modules (only available with api feature)
#[cfg(feature = "api")]
pub mod error;

// Re-export commonly used types
pub use backtesting::{
    brier_score, calculate_maximum_drawdown, calculate_sharpe_ratio, mean_brier_score,
};
pub use crate::core::{
    BetLimits, KellyBet, KellyCriterionCalculator, KellyError, Outcome, PortfolioAllocation,
    RiskLevel, RiskMetrics,
};
pub use models::{HistoricalMarket, Market, MarketWithPrediction, Position, Prediction, Resolution};
