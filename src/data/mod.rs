//! Data loading for market snapshots, positions and resolved markets

pub mod csv_loader;
pub mod json_loader;

use std::path::Path;
use thiserror::Error;

use crate::models::HistoricalMarket;

pub use csv_loader::load_historical_markets_csv;
pub use json_loader::{load_historical_markets, load_markets_with_predictions, load_positions};

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("Invalid record at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Load resolved markets, choosing the loader by file extension
pub fn load_historical<P: AsRef<Path>>(path: P) -> Result<Vec<HistoricalMarket>, DataError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("json") => load_historical_markets(path),
        Some("csv") => load_historical_markets_csv(path),
        _ => Err(DataError::UnsupportedFormat(path.display().to_string())),
    }
}
