//! Core sizing and decision logic

pub mod kelly;
pub mod portfolio;
pub mod signal;

// Re-export commonly used types
pub use kelly::{BetLimits, KellyBet, KellyCriterionCalculator, KellyError, Outcome};
pub use portfolio::{PortfolioAllocation, RiskLevel, RiskMetrics, MAX_PORTFOLIO_EXPOSURE};
pub use signal::{determine_action, ConfidenceLevel, SignalConfig, TradeAction, TradeSignal};
