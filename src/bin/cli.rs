//! Forecast Kelly CLI - Kelly sizing and backtesting for prediction markets

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use forecast_kelly::backtesting::metrics::{analyze_by_entry_price, analyze_by_side};
use forecast_kelly::backtesting::{brier_score, BacktestConfig, BacktestSimulator};
use forecast_kelly::core::signal::{determine_action, ConfidenceLevel, SignalConfig, TradeAction};
use forecast_kelly::data::{load_historical, load_markets_with_predictions, load_positions};
use forecast_kelly::{BetLimits, KellyBet, KellyCriterionCalculator, Outcome, Resolution};

#[cfg(feature = "manifold")]
use forecast_kelly::manifold::{ManifoldClient, ManifoldConfig};

#[derive(Parser)]
#[command(name = "forecast-kelly")]
#[command(author, version, about = "Kelly criterion sizing for prediction markets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Run in interactive mode
    #[arg(short, long)]
    interactive: bool,

    /// Show info-level logs
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Clone, Copy)]
struct KellyArgs {
    /// Cap on the Kelly fraction
    #[arg(long, default_value = "0.25")]
    max_fraction: f64,

    /// Minimum |model - market| to bet
    #[arg(long, default_value = "0.05")]
    min_edge: f64,
}

impl KellyArgs {
    fn calculator(self) -> KellyCriterionCalculator {
        KellyCriterionCalculator::new(self.max_fraction, self.min_edge)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Kelly fraction for a single bet
    Fraction {
        /// Model probability of YES
        #[arg(long)]
        model: f64,

        /// Market probability of YES
        #[arg(long)]
        market: f64,

        /// Side to bet: YES or NO
        #[arg(long, default_value = "YES")]
        outcome: String,

        /// Bankroll to size the stake against
        #[arg(long)]
        balance: Option<f64>,

        #[command(flatten)]
        kelly: KellyArgs,
    },

    /// Recommend bets across markets
    Recommend {
        /// JSON file of markets with predictions
        #[arg(short, long)]
        input: PathBuf,

        /// Current balance
        #[arg(short, long)]
        balance: f64,

        /// Maximum number of bets
        #[arg(long, default_value = "5")]
        max_bets: usize,

        /// Minimum stake per bet
        #[arg(long, default_value = "1.0")]
        min_bet: f64,

        /// Maximum stake per bet
        #[arg(long, default_value = "100.0")]
        max_bet: f64,

        #[command(flatten)]
        kelly: KellyArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Allocate a portfolio under the exposure cap
    Portfolio {
        /// JSON file of markets with predictions
        #[arg(short, long)]
        input: PathBuf,

        /// JSON file of existing positions
        #[arg(short, long)]
        positions: Option<PathBuf>,

        /// Current balance
        #[arg(short, long)]
        balance: f64,

        #[command(flatten)]
        kelly: KellyArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Trade signals for markets with predictions
    Analyze {
        /// JSON file of markets with predictions
        #[arg(short, long)]
        input: PathBuf,

        /// Minimum |model - market| to trade
        #[arg(long, default_value = "0.15")]
        threshold: f64,

        /// Base stake before confidence and difference scaling
        #[arg(long, default_value = "10.0")]
        bet_amount: f64,
    },

    /// Replay resolved markets
    Backtest {
        /// Resolved markets (.json or .csv)
        #[arg(short, long)]
        data: PathBuf,

        /// Starting balance
        #[arg(long, default_value = "1000.0")]
        initial_balance: f64,

        #[command(flatten)]
        kelly: KellyArgs,

        /// Minimum stake per bet
        #[arg(long, default_value = "1.0")]
        min_bet: f64,

        /// Maximum stake per market
        #[arg(long, default_value = "50.0")]
        max_bet: f64,

        /// Maximum stake as a share of the current balance
        #[arg(long, default_value = "0.10")]
        max_balance_fraction: f64,

        /// Maximum total stake per day
        #[arg(long, default_value = "200.0")]
        max_daily: f64,

        /// First market creation date to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last market creation date to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Save the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Brier score of stored forecasts against resolutions
    Score {
        /// Resolved markets (.json or .csv)
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Fetch open binary markets from Manifold (requires manifold feature)
    #[cfg(feature = "manifold")]
    Markets {
        /// Number of markets to fetch
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Search term instead of the latest markets
        #[arg(short, long)]
        search: Option<String>,

        /// Delay between requests in milliseconds
        #[arg(long, default_value = "500")]
        delay: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::INFO } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    println!(
        "{}",
        format!("Forecast Kelly CLI v{}", env!("CARGO_PKG_VERSION"))
            .cyan()
            .bold()
    );
    println!();

    if cli.interactive {
        run_interactive()?;
    } else if let Some(command) = cli.command {
        match command {
            Commands::Fraction {
                model,
                market,
                outcome,
                balance,
                kelly,
            } => {
                let outcome: Outcome = outcome.parse()?;
                print_fraction(&kelly.calculator(), model, market, outcome, balance);
            }
            Commands::Recommend {
                input,
                balance,
                max_bets,
                min_bet,
                max_bet,
                kelly,
                json,
            } => {
                let limits = BetLimits {
                    max_simultaneous_bets: max_bets,
                    min_bet_amount: min_bet,
                    max_bet_amount: max_bet,
                };
                run_recommend(&input, balance, &limits, &kelly.calculator(), json)?;
            }
            Commands::Portfolio {
                input,
                positions,
                balance,
                kelly,
                json,
            } => {
                run_portfolio(&input, positions.as_deref(), balance, &kelly.calculator(), json)?;
            }
            Commands::Analyze {
                input,
                threshold,
                bet_amount,
            } => {
                let config = SignalConfig {
                    confidence_threshold: threshold,
                    default_bet_amount: bet_amount,
                };
                run_analyze(&input, &config)?;
            }
            Commands::Backtest {
                data,
                initial_balance,
                kelly,
                min_bet,
                max_bet,
                max_balance_fraction,
                max_daily,
                start,
                end,
                output,
            } => {
                let config = BacktestConfig {
                    initial_balance,
                    max_kelly_fraction: kelly.max_fraction,
                    min_edge: kelly.min_edge,
                    min_bet_amount: min_bet,
                    max_bet_per_market: max_bet,
                    max_balance_fraction,
                    max_daily_spend: max_daily,
                    start_date: start,
                    end_date: end,
                };
                run_backtest(&data, config, output.as_deref())?;
            }
            Commands::Score { data } => {
                run_score(&data)?;
            }
            #[cfg(feature = "manifold")]
            Commands::Markets {
                limit,
                search,
                delay,
            } => {
                run_markets(limit, search.as_deref(), delay)?;
            }
        }
    } else {
        println!("Use --help for usage information or --interactive for interactive mode.");
    }

    Ok(())
}

fn print_fraction(
    calc: &KellyCriterionCalculator,
    model: f64,
    market: f64,
    outcome: Outcome,
    balance: Option<f64>,
) {
    let fraction = calc.calculate_kelly_fraction(model, market, outcome);
    let ev_per_unit = calc.calculate_expected_value(model, market, 1.0, outcome);
    let (p_win, side_price) = outcome.side_probabilities(model, market);

    println!("{}", "Kelly Sizing:".yellow().bold());
    println!("{}", "-".repeat(40));
    println!("Side:            {}", outcome);
    println!("Win probability: {:.1}%", p_win * 100.0);
    println!("Price paid:      {:.1}%", side_price * 100.0);
    println!("Edge:            {:+.1}%", (p_win - side_price) * 100.0);
    println!("EV per unit:     {:+.3}", ev_per_unit);

    let fraction_text = format!("{:.2}%", fraction * 100.0);
    if fraction > 0.0 {
        println!("Kelly fraction:  {}", fraction_text.green().bold());
    } else {
        println!("Kelly fraction:  {}", fraction_text.red());
    }

    if let Some(balance) = balance {
        println!("Stake:           {:.2} of {:.2}", fraction * balance, balance);
    }
}

fn print_bets(bets: &[KellyBet]) {
    println!(
        "{:<12} {:>4} {:>7} {:>7} {:>8} {:>10} {:>9}  {}",
        "Market", "Side", "Market", "Model", "Kelly", "Stake", "EV", "Question"
    );
    println!("{}", "-".repeat(100));

    for bet in bets {
        println!(
            "{:<12} {:>4} {:>6.1}% {:>6.1}% {:>7.2}% {:>10.2} {:>9.2}  {}",
            truncate(&bet.market_id, 12),
            bet.outcome,
            bet.market_probability * 100.0,
            bet.model_probability * 100.0,
            bet.kelly_fraction * 100.0,
            bet.bet_amount,
            bet.expected_value,
            truncate(&bet.question, 40)
        );
    }
}

fn run_recommend(
    input: &Path,
    balance: f64,
    limits: &BetLimits,
    calc: &KellyCriterionCalculator,
    json: bool,
) -> Result<()> {
    let markets = load_markets_with_predictions(input)
        .with_context(|| format!("Failed to load markets from {:?}", input))?;

    let bets = calc.recommend_bets(&markets, balance, limits);

    if json {
        println!("{}", serde_json::to_string_pretty(&bets)?);
        return Ok(());
    }

    println!(
        "{}: {} markets, balance {:.2}",
        "Recommending".green(),
        markets.len(),
        balance
    );
    println!();

    if bets.is_empty() {
        println!("{}", "No bets with positive expected value.".red());
        return Ok(());
    }

    print_bets(&bets);

    let total: f64 = bets.iter().map(|b| b.bet_amount).sum();
    let ev: f64 = bets.iter().map(|b| b.expected_value).sum();
    println!();
    println!("Total stake: {:.2}  Expected value: {:+.2}", total, ev);

    Ok(())
}

fn run_portfolio(
    input: &Path,
    positions: Option<&Path>,
    balance: f64,
    calc: &KellyCriterionCalculator,
    json: bool,
) -> Result<()> {
    let markets = load_markets_with_predictions(input)
        .with_context(|| format!("Failed to load markets from {:?}", input))?;
    let positions = match positions {
        Some(path) => load_positions(path)
            .with_context(|| format!("Failed to load positions from {:?}", path))?,
        None => Vec::new(),
    };

    let allocation = calc.calculate_portfolio_kelly(&positions, &markets, balance);

    if json {
        println!("{}", serde_json::to_string_pretty(&allocation)?);
        return Ok(());
    }

    if let Some(ref error) = allocation.risk_metrics.error {
        println!("{}: {}", "Allocation failed".red(), error);
        return Ok(());
    }

    println!("{}", "Portfolio Allocation:".yellow().bold());
    println!("{}", "-".repeat(40));
    println!("Total value:       {:.2}", allocation.total_value);
    println!("Available balance: {:.2}", allocation.available_balance);
    println!(
        "Concentration:     {:.1}%",
        allocation.risk_metrics.portfolio_concentration * 100.0
    );
    println!(
        "Expected return:   {:+.2}",
        allocation.risk_metrics.expected_return
    );

    let risk = allocation.risk_metrics.risk_level.to_string();
    let risk = match allocation.risk_metrics.risk_level {
        forecast_kelly::RiskLevel::High => risk.red().bold(),
        forecast_kelly::RiskLevel::Medium => risk.yellow(),
        forecast_kelly::RiskLevel::Low => risk.green(),
    };
    println!("Risk level:        {}", risk);
    println!();

    if allocation.recommended_bets.is_empty() {
        println!("{}", "No bets recommended.".red());
    } else {
        print_bets(&allocation.recommended_bets);
    }

    Ok(())
}

fn run_analyze(input: &Path, config: &SignalConfig) -> Result<()> {
    let markets = load_markets_with_predictions(input)
        .with_context(|| format!("Failed to load markets from {:?}", input))?;
    let now_ms = Utc::now().timestamp_millis();

    println!(
        "{}: {} markets (threshold {:.2})",
        "Analyzing".green(),
        markets.len(),
        config.confidence_threshold
    );
    println!();
    println!(
        "{:<12} {:>8} {:>7} {:>7} {:>8}  {}",
        "Market", "Action", "Market", "Model", "Stake", "Reasoning"
    );
    println!("{}", "-".repeat(90));

    let mut trades = 0;
    for entry in &markets {
        let confidence = ConfidenceLevel::from_score(entry.prediction.confidence);
        let signal = determine_action(
            config,
            entry.prediction.probability,
            entry.market.probability,
            confidence,
            None,
            now_ms,
        );

        let action = signal.action.to_string();
        let action = match signal.action {
            TradeAction::BuyYes | TradeAction::BuyNo => action.green().bold(),
            TradeAction::Hold => action.yellow(),
            TradeAction::Avoid => action.red(),
        };
        if signal.action.is_trade() {
            trades += 1;
        }

        println!(
            "{:<12} {:>8} {:>6.1}% {:>6.1}% {:>8}  {}",
            truncate(&entry.market.id, 12),
            action,
            entry.market.probability * 100.0,
            entry.prediction.probability * 100.0,
            signal
                .bet_amount
                .map_or_else(|| "-".to_string(), |a| format!("{:.2}", a)),
            signal.reasoning
        );
    }

    println!();
    println!("Trade signals: {}/{}", trades, markets.len());

    Ok(())
}

fn run_backtest(data: &Path, config: BacktestConfig, output: Option<&Path>) -> Result<()> {
    println!("{}", "Running backtest...".green());

    let markets =
        load_historical(data).with_context(|| format!("Failed to load markets from {:?}", data))?;

    println!("Markets loaded: {}", markets.len());
    println!("Initial balance: {:.2}", config.initial_balance);
    match (config.start_date, config.end_date) {
        (None, None) => println!("Using all data"),
        (start, end) => println!(
            "Period: {} to {}",
            start.map_or_else(|| "-".to_string(), |d| d.to_string()),
            end.map_or_else(|| "-".to_string(), |d| d.to_string())
        ),
    }
    println!();

    let pb = ProgressBar::new(markets.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Replaying markets");

    let simulator = BacktestSimulator::new(config);
    let result = simulator.run_with_progress(&markets, || pb.inc(1));

    pb.finish_and_clear();

    simulator.print_summary(&result);

    if !result.trades.is_empty() {
        println!("\n{}", "Analysis by Side:".yellow().bold());
        print_dimension_table(&analyze_by_side(&result.trades));

        println!("\n{}", "Analysis by Entry Price:".yellow().bold());
        print_dimension_table(&analyze_by_entry_price(&result.trades));
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        println!("\n{}: {:?}", "Saved".green(), path);
    }

    Ok(())
}

fn print_dimension_table(rows: &[forecast_kelly::backtesting::DimensionAnalysis]) {
    println!(
        "{:>18} {:>8} {:>8} {:>10} {:>12} {:>10}",
        "Group", "Trades", "Wins", "Hit Rate", "Profit", "ROI"
    );
    println!("{}", "-".repeat(70));
    for a in rows {
        println!(
            "{:>18} {:>8} {:>8} {:>9.1}% {:>12.2} {:>9.1}%",
            a.key,
            a.trades,
            a.wins,
            a.hit_rate * 100.0,
            a.profit,
            a.roi * 100.0
        );
    }
}

fn run_score(data: &Path) -> Result<()> {
    let markets =
        load_historical(data).with_context(|| format!("Failed to load markets from {:?}", data))?;

    let mut model_scores = Vec::new();
    let mut market_scores = Vec::new();
    let mut cancelled = 0;
    let mut unresolved = 0;

    for market in &markets {
        match market.resolution.map(Resolution::outcome_value) {
            Some(Some(outcome)) => {
                model_scores.push(brier_score(market.prediction.probability, outcome));
                market_scores.push(brier_score(market.initial_probability, outcome));
            }
            Some(None) => cancelled += 1,
            None => unresolved += 1,
        }
    }

    println!("{}", "Forecast Scoring:".yellow().bold());
    println!("{}", "-".repeat(40));
    println!("Markets:    {}", markets.len());
    println!("Scored:     {}", model_scores.len());
    println!("Cancelled:  {}", cancelled);
    println!("Unresolved: {}", unresolved);

    if model_scores.is_empty() {
        println!("{}", "No resolved markets to score.".red());
        return Ok(());
    }

    let n = model_scores.len() as f64;
    let model_brier = model_scores.iter().sum::<f64>() / n;
    let market_brier = market_scores.iter().sum::<f64>() / n;

    println!("{}", "-".repeat(40));
    println!("Model Brier:  {:.4}", model_brier);
    println!("Market Brier: {:.4}", market_brier);

    let verdict = if model_brier < market_brier {
        "Model beats the market".green().bold()
    } else {
        "Market beats the model".red()
    };
    println!("{}", verdict);

    Ok(())
}

#[cfg(feature = "manifold")]
fn run_markets(limit: usize, search: Option<&str>, delay: u64) -> Result<()> {
    // Create runtime for async operations
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let config = ManifoldConfig {
        delay_ms: delay,
        ..Default::default()
    };
    let client = ManifoldClient::new(config).context("Failed to create Manifold client")?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Fetching markets...");

    let markets = rt.block_on(async {
        match search {
            Some(term) => client.search_markets(term, limit, "open").await,
            None => client.get_markets(limit, None).await,
        }
    });

    pb.finish_and_clear();

    let markets = markets.context("Failed to fetch markets")?;
    let now_ms = Utc::now().timestamp_millis();
    let open: Vec<_> = markets.iter().filter(|m| m.is_open_binary(now_ms)).collect();

    println!(
        "{}: {} open binary markets of {} fetched",
        "Markets".green(),
        open.len(),
        markets.len()
    );
    println!();
    println!("{:<12} {:>7} {:>10}  {}", "Id", "Prob", "Volume", "Question");
    println!("{}", "-".repeat(90));

    for market in open {
        let m = market.to_market();
        println!(
            "{:<12} {:>6.1}% {:>10.0}  {}",
            truncate(&m.id, 12),
            m.probability * 100.0,
            market.volume,
            truncate(&m.question, 60)
        );
    }

    Ok(())
}

fn run_interactive() -> Result<()> {
    println!("{}", "Interactive mode".green().bold());
    println!();

    let theme = ColorfulTheme::default();

    loop {
        let options = vec!["Kelly fraction", "Quit"];

        let selection = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(&options)
            .default(0)
            .interact()?;

        if selection != 0 {
            println!("Goodbye!");
            break;
        }

        let model: f64 = Input::with_theme(&theme)
            .with_prompt("Model probability of YES (0-1)")
            .validate_with(|v: &f64| validate_unit(*v))
            .interact_text()?;

        let market: f64 = Input::with_theme(&theme)
            .with_prompt("Market probability of YES (0-1)")
            .validate_with(|v: &f64| validate_unit(*v))
            .interact_text()?;

        let outcome = if Select::with_theme(&theme)
            .with_prompt("Side")
            .items(&["YES", "NO"])
            .default(0)
            .interact()?
            == 0
        {
            Outcome::Yes
        } else {
            Outcome::No
        };

        let balance: f64 = Input::with_theme(&theme)
            .with_prompt("Balance")
            .default(1000.0)
            .interact_text()?;

        let max_fraction: f64 = Input::with_theme(&theme)
            .with_prompt("Max Kelly fraction")
            .default(0.25)
            .interact_text()?;

        println!();
        let calc = KellyCriterionCalculator::new(max_fraction, 0.05);
        print_fraction(&calc, model, market, outcome, Some(balance));
        println!();
    }

    Ok(())
}

fn validate_unit(value: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err("Must be between 0 and 1".to_string())
    }
}

/// Truncate text to fit display width
fn truncate(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        text.to_string()
    } else {
        chars[..max_len - 1].iter().collect::<String>() + "…"
    }
}
