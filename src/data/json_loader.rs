//! JSON loading for market snapshots, positions and resolved markets

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use super::DataError;
use crate::models::{HistoricalMarket, MarketWithPrediction, Position};

/// Either a bare list or a `{"markets": [...]}` wrapper
#[derive(Deserialize)]
#[serde(untagged)]
enum MarketsFile<T> {
    Wrapped { markets: Vec<T> },
    List(Vec<T>),
}

impl<T> MarketsFile<T> {
    fn into_markets(self) -> Vec<T> {
        match self {
            MarketsFile::Wrapped { markets } => markets,
            MarketsFile::List(markets) => markets,
        }
    }
}

fn load_markets<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DataError> {
    let content = fs::read_to_string(path)?;
    let file: MarketsFile<T> = serde_json::from_str(&content)?;
    let markets = file.into_markets();
    info!("Loaded {} markets from {}", markets.len(), path.display());
    Ok(markets)
}

/// Load candidate markets with their forecasts
pub fn load_markets_with_predictions<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<MarketWithPrediction>, DataError> {
    load_markets(path.as_ref())
}

/// Load resolved markets for backtesting
pub fn load_historical_markets<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<HistoricalMarket>, DataError> {
    load_markets(path.as_ref())
}

/// Load existing positions (a JSON list)
pub fn load_positions<P: AsRef<Path>>(path: P) -> Result<Vec<Position>, DataError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
