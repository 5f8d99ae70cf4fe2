//! Backtest Metrics
//!
//! Sharpe ratio, maximum drawdown, Brier score and per-trade summaries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::simulator::Trade;
use crate::models::Resolution;

/// Sharpe ratio of a return series
///
/// Uses the sample standard deviation (n - 1). Returns 0.0 with fewer than
/// two observations, zero variance, or a non-finite result.
///
/// # Examples
/// ```
/// use forecast_kelly::backtesting::metrics::calculate_sharpe_ratio;
/// assert_eq!(calculate_sharpe_ratio(&[5.0], 0.0), 0.0);
/// assert!(calculate_sharpe_ratio(&[0.1, 0.3], 0.0) > 0.0);
/// ```
pub fn calculate_sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean_return: f64 = returns.iter().sum::<f64>() / n;

    let variance: f64 = returns
        .iter()
        .map(|r| (r - mean_return).powi(2))
        .sum::<f64>()
        / (n - 1.0);

    let std_dev = variance.sqrt();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return 0.0;
    }

    let sharpe = (mean_return - risk_free_rate) / std_dev;
    if sharpe.is_finite() {
        sharpe
    } else {
        0.0
    }
}

/// Largest fractional decline from a running peak
///
/// Returns 0.0 with fewer than two values, or when a decline is measured
/// from a zero peak.
///
/// # Examples
/// ```
/// use forecast_kelly::backtesting::metrics::calculate_maximum_drawdown;
/// assert_eq!(calculate_maximum_drawdown(&[100.0, 50.0, 80.0]), 0.5);
/// ```
pub fn calculate_maximum_drawdown(portfolio_values: &[f64]) -> f64 {
    if portfolio_values.len() < 2 {
        return 0.0;
    }

    let mut peak = portfolio_values[0];
    let mut max_drawdown = 0.0_f64;

    for &value in &portfolio_values[1..] {
        if value > peak {
            peak = value;
        } else {
            if peak == 0.0 {
                return 0.0;
            }
            let drawdown = (peak - value) / peak;
            max_drawdown = max_drawdown.max(drawdown);
        }
    }

    if max_drawdown.is_finite() {
        max_drawdown
    } else {
        0.0
    }
}

/// Squared error between a forecast and the realized outcome (0 or 1, or a
/// fractional resolution)
pub fn brier_score(probability: f64, outcome_value: f64) -> f64 {
    (probability - outcome_value).powi(2)
}

/// Mean Brier score over resolved forecasts, skipping cancelled markets
///
/// Returns 0.0 when nothing is scoreable.
pub fn mean_brier_score(forecasts: &[(f64, Resolution)]) -> f64 {
    let scores: Vec<f64> = forecasts
        .iter()
        .filter_map(|(p, r)| r.outcome_value().map(|o| brier_score(*p, o)))
        .filter(|s| s.is_finite())
        .collect();

    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Aggregate trade statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub cancelled_trades: usize,
    pub win_rate: f64,

    pub total_staked: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub net_profit: f64,
    pub profit_factor: f64,
    pub avg_profit_per_trade: f64,

    pub avg_entry_price: f64,
    pub avg_edge: f64,
}

/// Calculate metrics from trades
pub fn calculate_trade_metrics(trades: &[Trade]) -> TradeMetrics {
    if trades.is_empty() {
        return TradeMetrics::default();
    }

    let total_trades = trades.len();
    let winning_trades = trades.iter().filter(|t| t.profit > 0.0).count();
    let losing_trades = trades.iter().filter(|t| t.profit < 0.0).count();
    let cancelled_trades = trades
        .iter()
        .filter(|t| t.resolved_outcome == Resolution::Cancel)
        .count();
    let win_rate = winning_trades as f64 / total_trades as f64;

    let total_staked: f64 = trades.iter().map(|t| t.amount).sum();
    let gross_profit: f64 = trades.iter().map(|t| t.profit).filter(|p| *p > 0.0).sum();
    let gross_loss: f64 = trades
        .iter()
        .map(|t| t.profit)
        .filter(|p| *p < 0.0)
        .map(f64::abs)
        .sum();
    let net_profit = gross_profit - gross_loss;

    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let n = total_trades as f64;
    let avg_entry_price = trades.iter().map(|t| t.side_entry_price()).sum::<f64>() / n;
    let avg_edge = trades
        .iter()
        .map(|t| t.side_model_probability() - t.side_entry_price())
        .sum::<f64>()
        / n;

    TradeMetrics {
        total_trades,
        winning_trades,
        losing_trades,
        cancelled_trades,
        win_rate,
        total_staked,
        gross_profit,
        gross_loss,
        net_profit,
        profit_factor,
        avg_profit_per_trade: net_profit / n,
        avg_entry_price,
        avg_edge,
    }
}

/// Results grouped along one dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionAnalysis {
    pub key: String,
    pub trades: usize,
    pub wins: usize,
    pub hit_rate: f64,
    pub staked: f64,
    pub profit: f64,
    pub roi: f64,
}

fn analyze_groups<F>(trades: &[Trade], key_fn: F) -> Vec<DimensionAnalysis>
where
    F: Fn(&Trade) -> String,
{
    let mut grouped: HashMap<String, Vec<&Trade>> = HashMap::new();
    for trade in trades {
        grouped.entry(key_fn(trade)).or_default().push(trade);
    }

    let mut results: Vec<DimensionAnalysis> = grouped
        .into_iter()
        .map(|(key, group)| {
            let total = group.len();
            let wins = group.iter().filter(|t| t.profit > 0.0).count();
            let staked: f64 = group.iter().map(|t| t.amount).sum();
            let profit: f64 = group.iter().map(|t| t.profit).sum();

            DimensionAnalysis {
                key,
                trades: total,
                wins,
                hit_rate: if total > 0 {
                    wins as f64 / total as f64
                } else {
                    0.0
                },
                staked,
                profit,
                roi: if staked > 0.0 { profit / staked } else { 0.0 },
            }
        })
        .collect();

    results.sort_by(|a, b| a.key.cmp(&b.key));
    results
}

/// Analyze trades by side bought
pub fn analyze_by_side(trades: &[Trade]) -> Vec<DimensionAnalysis> {
    analyze_groups(trades, |t| t.outcome.to_string())
}

/// Analyze trades by the price paid for the chosen side
pub fn analyze_by_entry_price(trades: &[Trade]) -> Vec<DimensionAnalysis> {
    analyze_groups(trades, |t| {
        let price = t.side_entry_price();
        if price < 0.3 {
            "longshot (<0.3)".to_string()
        } else if price <= 0.7 {
            "even (0.3-0.7)".to_string()
        } else {
            "favourite (>0.7)".to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kelly::Outcome;

    fn trade(outcome: Outcome, entry_price: f64, amount: f64, resolution: Resolution) -> Trade {
        let side_price = match outcome {
            Outcome::Yes => entry_price,
            Outcome::No => 1.0 - entry_price,
        };
        let payout = match resolution {
            Resolution::Cancel => amount,
            r if r.pays(outcome) => amount / side_price,
            _ => 0.0,
        };
        let profit = payout - amount;
        Trade {
            trade_id: "t".to_string(),
            market_id: "m".to_string(),
            question: String::new(),
            trade_date: None,
            outcome,
            amount,
            entry_price,
            model_probability: 0.6,
            confidence: 0.5,
            reasoning: String::new(),
            resolved_outcome: resolution,
            payout,
            profit,
            roi: profit / amount,
        }
    }

    #[test]
    fn test_sharpe_short_series() {
        assert_eq!(calculate_sharpe_ratio(&[], 0.0), 0.0);
        assert_eq!(calculate_sharpe_ratio(&[5.0], 0.0), 0.0);
    }

    #[test]
    fn test_sharpe_zero_variance() {
        assert_eq!(calculate_sharpe_ratio(&[0.2, 0.2, 0.2], 0.0), 0.0);
    }

    #[test]
    fn test_sharpe_sample_std() {
        // mean = 5, sample variance = ((2)^2 + (6)^2 + (4)^2) / 2 = 28
        let sharpe = calculate_sharpe_ratio(&[7.0, -1.0, 9.0], 0.0);
        assert!((sharpe - 5.0 / 28.0_f64.sqrt()).abs() < 1e-12);

        let with_rf = calculate_sharpe_ratio(&[7.0, -1.0, 9.0], 1.0);
        assert!((with_rf - 4.0 / 28.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_sharpe_non_finite() {
        assert_eq!(calculate_sharpe_ratio(&[1.0, f64::NAN], 0.0), 0.0);
        assert_eq!(calculate_sharpe_ratio(&[1.0, f64::INFINITY], 0.0), 0.0);
    }

    #[test]
    fn test_max_drawdown() {
        assert_eq!(calculate_maximum_drawdown(&[]), 0.0);
        assert_eq!(calculate_maximum_drawdown(&[100.0]), 0.0);
        assert_eq!(calculate_maximum_drawdown(&[100.0, 50.0, 80.0]), 0.5);
        assert_eq!(calculate_maximum_drawdown(&[100.0, 110.0, 120.0]), 0.0);

        // Second decline from a new peak is larger: (200 - 50) / 200
        let dd = calculate_maximum_drawdown(&[100.0, 80.0, 200.0, 50.0]);
        assert!((dd - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_max_drawdown_zero_peak() {
        assert_eq!(calculate_maximum_drawdown(&[0.0, -10.0]), 0.0);
    }

    #[test]
    fn test_brier_score() {
        assert_eq!(brier_score(1.0, 1.0), 0.0);
        assert!((brier_score(0.7, 0.0) - 0.49).abs() < 1e-12);

        let forecasts = [
            (0.8, Resolution::Yes),
            (0.4, Resolution::No),
            (0.9, Resolution::Cancel),
        ];
        // (0.04 + 0.16) / 2
        assert!((mean_brier_score(&forecasts) - 0.1).abs() < 1e-12);
        assert_eq!(mean_brier_score(&[(0.5, Resolution::Cancel)]), 0.0);
        assert_eq!(mean_brier_score(&[]), 0.0);
    }

    #[test]
    fn test_trade_metrics() {
        let trades = vec![
            trade(Outcome::Yes, 0.5, 10.0, Resolution::Yes), // +10
            trade(Outcome::No, 0.8, 10.0, Resolution::Yes),  // -10
            trade(Outcome::Yes, 0.25, 20.0, Resolution::Yes), // +60
            trade(Outcome::Yes, 0.5, 5.0, Resolution::Cancel), // 0
        ];
        let metrics = calculate_trade_metrics(&trades);

        assert_eq!(metrics.total_trades, 4);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 1);
        assert_eq!(metrics.cancelled_trades, 1);
        assert!((metrics.win_rate - 0.5).abs() < 1e-12);
        assert!((metrics.total_staked - 45.0).abs() < 1e-9);
        assert!((metrics.gross_profit - 70.0).abs() < 1e-9);
        assert!((metrics.gross_loss - 10.0).abs() < 1e-9);
        assert!((metrics.net_profit - 60.0).abs() < 1e-9);
        assert!((metrics.profit_factor - 7.0).abs() < 1e-9);
        assert!((metrics.avg_profit_per_trade - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_trade_metrics_empty() {
        let metrics = calculate_trade_metrics(&[]);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, 0.0);
    }

    #[test]
    fn test_analyze_by_side() {
        let trades = vec![
            trade(Outcome::Yes, 0.5, 10.0, Resolution::Yes),
            trade(Outcome::No, 0.8, 10.0, Resolution::Yes),
            trade(Outcome::Yes, 0.25, 20.0, Resolution::No),
        ];
        let analysis = analyze_by_side(&trades);

        assert_eq!(analysis.len(), 2);
        let yes = analysis.iter().find(|a| a.key == "YES").unwrap();
        assert_eq!(yes.trades, 2);
        assert_eq!(yes.wins, 1);
        assert!((yes.profit - (10.0 - 20.0)).abs() < 1e-9);

        let no = analysis.iter().find(|a| a.key == "NO").unwrap();
        assert_eq!(no.trades, 1);
        assert_eq!(no.wins, 0);
    }

    #[test]
    fn test_analyze_by_entry_price() {
        let trades = vec![
            trade(Outcome::Yes, 0.5, 10.0, Resolution::Yes),
            // NO bought at 1 - 0.8 = 0.2
            trade(Outcome::No, 0.8, 10.0, Resolution::Yes),
            trade(Outcome::Yes, 0.25, 20.0, Resolution::No),
        ];
        let analysis = analyze_by_entry_price(&trades);

        assert_eq!(analysis.len(), 2);
        let longshots = analysis.iter().find(|a| a.key.starts_with("longshot")).unwrap();
        assert_eq!(longshots.trades, 2);
        let even = analysis.iter().find(|a| a.key.starts_with("even")).unwrap();
        assert_eq!(even.trades, 1);
    }
}
