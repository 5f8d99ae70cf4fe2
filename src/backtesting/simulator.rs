//! Backtest Simulator
//!
//! Replays resolved markets in creation order, sizes each bet with the Kelly
//! calculator and settles it against the known resolution.

use super::metrics::{
    calculate_maximum_drawdown, calculate_sharpe_ratio, calculate_trade_metrics,
    mean_brier_score, TradeMetrics,
};
use crate::core::kelly::{BetLimits, KellyCriterionCalculator, KellyError, Outcome};
use crate::models::{HistoricalMarket, Resolution};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Individual simulated trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub market_id: String,
    pub question: String,
    pub trade_date: Option<NaiveDate>,
    pub outcome: Outcome,
    pub amount: f64,
    /// Market P(YES) at entry
    pub entry_price: f64,
    /// Forecast P(YES)
    pub model_probability: f64,
    pub confidence: f64,
    pub reasoning: String,
    pub resolved_outcome: Resolution,
    pub payout: f64,
    pub profit: f64,
    pub roi: f64,
}

impl Trade {
    /// Price paid for the side bought
    pub fn side_entry_price(&self) -> f64 {
        match self.outcome {
            Outcome::Yes => self.entry_price,
            Outcome::No => 1.0 - self.entry_price,
        }
    }

    /// Forecast probability of the side bought
    pub fn side_model_probability(&self) -> f64 {
        match self.outcome {
            Outcome::Yes => self.model_probability,
            Outcome::No => 1.0 - self.model_probability,
        }
    }
}

/// Payout of a resolved bet
///
/// A winning share pays 1 per share bought at the side's entry price, a
/// cancelled market refunds the stake.
pub fn settle(
    outcome: Outcome,
    amount: f64,
    entry_price: f64,
    resolution: Resolution,
) -> Result<f64, KellyError> {
    if resolution == Resolution::Cancel {
        return Ok(amount);
    }
    if !resolution.pays(outcome) {
        return Ok(0.0);
    }

    let side_price = match outcome {
        Outcome::Yes => entry_price,
        Outcome::No => 1.0 - entry_price,
    };
    if side_price <= 0.0 {
        return Err(KellyError::DivisionByZero("entry price"));
    }

    let payout = amount / side_price;
    if payout.is_finite() {
        Ok(payout)
    } else {
        Err(KellyError::NonFiniteResult)
    }
}

/// Backtest result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_profit: f64,
    pub total_roi: f64,

    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub cancelled_trades: usize,
    pub win_rate: f64,
    pub avg_profit_per_trade: f64,

    pub markets_analyzed: usize,
    pub opportunities_found: usize,
    pub opportunity_rate: f64,

    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub brier_score: f64,

    /// Balance after each trade, starting with the initial balance
    pub balance_history: Vec<f64>,
    pub trades: Vec<Trade>,
    pub metrics: Option<TradeMetrics>,
}

impl BacktestResult {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            start_date: None,
            end_date: None,
            initial_balance,
            final_balance: initial_balance,
            total_profit: 0.0,
            total_roi: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            cancelled_trades: 0,
            win_rate: 0.0,
            avg_profit_per_trade: 0.0,
            markets_analyzed: 0,
            opportunities_found: 0,
            opportunity_rate: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            brier_score: 0.0,
            balance_history: vec![initial_balance],
            trades: Vec::new(),
            metrics: None,
        }
    }

    /// Fill in the summary statistics from the trades and balance history
    pub fn finalize(&mut self, forecasts: &[(f64, Resolution)]) {
        self.total_profit = self.final_balance - self.initial_balance;
        self.total_roi = if self.initial_balance > 0.0 {
            self.total_profit / self.initial_balance
        } else {
            0.0
        };

        let metrics = calculate_trade_metrics(&self.trades);
        self.total_trades = metrics.total_trades;
        self.winning_trades = metrics.winning_trades;
        self.losing_trades = metrics.losing_trades;
        self.cancelled_trades = metrics.cancelled_trades;
        self.win_rate = metrics.win_rate;
        self.avg_profit_per_trade = if self.total_trades > 0 {
            self.total_profit / self.total_trades as f64
        } else {
            0.0
        };

        self.opportunity_rate = if self.markets_analyzed > 0 {
            self.opportunities_found as f64 / self.markets_analyzed as f64
        } else {
            0.0
        };

        let returns: Vec<f64> = self.trades.iter().map(|t| t.roi).collect();
        self.sharpe_ratio = calculate_sharpe_ratio(&returns, 0.0);
        self.max_drawdown = calculate_maximum_drawdown(&self.balance_history);
        self.brier_score = mean_brier_score(forecasts);
        self.metrics = Some(metrics);
    }
}

/// Backtest simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    pub max_kelly_fraction: f64,
    pub min_edge: f64,
    pub min_bet_amount: f64,
    pub max_bet_per_market: f64,
    /// Cap on a single stake as a share of the current balance
    pub max_balance_fraction: f64,
    pub max_daily_spend: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_balance: 1000.0,
            max_kelly_fraction: 0.25,
            min_edge: 0.05,
            min_bet_amount: 1.0,
            max_bet_per_market: 50.0,
            max_balance_fraction: 0.10,
            max_daily_spend: 200.0,
            start_date: None,
            end_date: None,
        }
    }
}

/// Backtest simulator
pub struct BacktestSimulator {
    pub config: BacktestConfig,
    calculator: KellyCriterionCalculator,
}

impl BacktestSimulator {
    /// Create a new backtest simulator
    pub fn new(config: BacktestConfig) -> Self {
        let calculator = KellyCriterionCalculator::new(config.max_kelly_fraction, config.min_edge);
        Self { config, calculator }
    }

    fn in_window(&self, date: Option<NaiveDate>) -> bool {
        match (date, self.config.start_date, self.config.end_date) {
            (_, None, None) => true,
            (None, _, _) => false,
            (Some(d), start, end) => {
                start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e)
            }
        }
    }

    /// Run backtest on historical markets
    pub fn run(&self, markets: &[HistoricalMarket]) -> BacktestResult {
        self.run_with_progress(markets, || {})
    }

    /// Run backtest, calling `on_market` once per input market
    pub fn run_with_progress<F>(&self, markets: &[HistoricalMarket], mut on_market: F) -> BacktestResult
    where
        F: FnMut(),
    {
        let mut result = BacktestResult::new(self.config.initial_balance);
        result.start_date = self.config.start_date;
        result.end_date = self.config.end_date;

        let mut ordered: Vec<&HistoricalMarket> = markets.iter().collect();
        ordered.sort_by_key(|m| m.created_time.unwrap_or(0));

        let limits = BetLimits {
            max_simultaneous_bets: 1,
            min_bet_amount: self.config.min_bet_amount,
            max_bet_amount: self.config.max_bet_per_market,
        };

        let mut balance = self.config.initial_balance;
        let mut daily_spend: HashMap<Option<NaiveDate>, f64> = HashMap::new();
        let mut forecasts: Vec<(f64, Resolution)> = Vec::new();

        for market in ordered {
            on_market();

            let resolution = match market.resolution {
                Some(r) => r,
                None => continue,
            };
            let trade_date = market.created_date();
            if !self.in_window(trade_date) {
                continue;
            }

            result.markets_analyzed += 1;
            forecasts.push((market.prediction.probability, resolution));

            let spent = daily_spend.get(&trade_date).copied().unwrap_or(0.0);
            let daily_remaining = self.config.max_daily_spend - spent;
            if daily_remaining <= 0.0 {
                continue;
            }

            let candidate = market.to_market_with_prediction();
            let bet = match self
                .calculator
                .recommend_bets(std::slice::from_ref(&candidate), balance, &limits)
                .into_iter()
                .next()
            {
                Some(b) => b,
                None => continue,
            };
            result.opportunities_found += 1;

            let amount = bet
                .bet_amount
                .min(balance * self.config.max_balance_fraction)
                .min(daily_remaining);
            if amount < self.config.min_bet_amount {
                continue;
            }

            let payout = match settle(bet.outcome, amount, market.initial_probability, resolution) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Cannot settle market {}: {}", market.id, e);
                    continue;
                }
            };
            let profit = payout - amount;

            balance += profit;
            *daily_spend.entry(trade_date).or_insert(0.0) += amount;
            result.balance_history.push(balance);

            debug!(
                "Trade {} {} {:.2} on {} -> {}",
                market.id, bet.outcome, amount, market.question, resolution
            );

            let date_tag = trade_date
                .map(|d| d.format("%Y%m%d").to_string())
                .unwrap_or_else(|| "undated".to_string());

            result.trades.push(Trade {
                trade_id: format!("{}_{}", market.id, date_tag),
                market_id: market.id.clone(),
                question: market.question.clone(),
                trade_date,
                outcome: bet.outcome,
                amount,
                entry_price: market.initial_probability,
                model_probability: market.prediction.probability,
                confidence: market.prediction.confidence,
                reasoning: bet.reasoning,
                resolved_outcome: resolution,
                payout,
                profit,
                roi: profit / amount,
            });
        }

        result.final_balance = balance;
        result.finalize(&forecasts);

        info!(
            "Backtest finished: {} markets analyzed, {} trades, final balance {:.2}",
            result.markets_analyzed, result.total_trades, result.final_balance
        );

        result
    }

    /// Print summary of backtest result
    pub fn print_summary(&self, result: &BacktestResult) {
        let fmt_date = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());

        println!("\n{}", "=".repeat(60));
        println!("BACKTEST RESULTS");
        println!("{}", "=".repeat(60));
        println!(
            "Period: {} to {}",
            fmt_date(result.start_date),
            fmt_date(result.end_date)
        );
        println!("Max Kelly fraction: {:.2}", self.config.max_kelly_fraction);
        println!("Min edge: {:.2}", self.config.min_edge);
        println!("Max bet per market: {:.2}", self.config.max_bet_per_market);
        println!("Max daily spend: {:.2}", self.config.max_daily_spend);
        println!("{}", "-".repeat(60));
        println!("Markets analyzed: {}", result.markets_analyzed);
        println!(
            "Opportunities: {} ({:.1}%)",
            result.opportunities_found,
            result.opportunity_rate * 100.0
        );
        println!("Total trades: {}", result.total_trades);
        println!(
            "Won / lost / cancelled: {} / {} / {}",
            result.winning_trades, result.losing_trades, result.cancelled_trades
        );
        println!("Win rate: {:.1}%", result.win_rate * 100.0);
        println!("{}", "-".repeat(60));
        println!("Initial balance: {:.2}", result.initial_balance);
        println!("Final balance: {:.2}", result.final_balance);
        println!("Total profit: {:.2}", result.total_profit);
        println!("ROI: {:.1}%", result.total_roi * 100.0);
        println!("Avg profit per trade: {:.2}", result.avg_profit_per_trade);
        println!("{}", "-".repeat(60));
        println!("Sharpe ratio: {:.3}", result.sharpe_ratio);
        println!("Max drawdown: {:.1}%", result.max_drawdown * 100.0);
        println!("Brier score: {:.4}", result.brier_score);

        if let Some(ref metrics) = result.metrics {
            println!("Profit factor: {:.2}", metrics.profit_factor);
            println!("Average edge: {:.3}", metrics.avg_edge);
        }

        println!("{}", "=".repeat(60));
    }
}
