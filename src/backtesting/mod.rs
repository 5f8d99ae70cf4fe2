//! Historical replay for validating the sizing strategy

pub mod metrics;
pub mod simulator;

pub use metrics::{
    analyze_by_entry_price, analyze_by_side, brier_score, calculate_maximum_drawdown,
    calculate_sharpe_ratio, calculate_trade_metrics, mean_brier_score, DimensionAnalysis,
    TradeMetrics,
};
pub use simulator::{settle, BacktestConfig, BacktestResult, BacktestSimulator, Trade};
