//! CSV loading for resolved markets

use polars::prelude::*;
use std::path::Path;
use tracing::info;

use super::DataError;
use crate::models::{HistoricalMarket, Prediction, Resolution};

fn f64_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

fn i64_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let series = df.column(name)?.cast(&DataType::Int64)?;
    let values = series.i64()?.into_iter().collect();
    Ok(values)
}

fn str_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Load resolved markets from CSV
///
/// Required columns: `id`, `question`, `initial_probability`,
/// `model_probability`, `resolution`. Optional: `created_time` (epoch ms),
/// `confidence`, `reasoning`. An empty resolution leaves the market
/// unresolved.
pub fn load_historical_markets_csv<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<HistoricalMarket>, DataError> {
    let path = path.as_ref();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let ids = str_column(&df, "id")?;
    let questions = str_column(&df, "question")?;
    let initial = f64_column(&df, "initial_probability")?;
    let model = f64_column(&df, "model_probability")?;
    let resolutions = str_column(&df, "resolution")?;

    let created = if has_column(&df, "created_time") {
        Some(i64_column(&df, "created_time")?)
    } else {
        None
    };
    let confidence = if has_column(&df, "confidence") {
        Some(f64_column(&df, "confidence")?)
    } else {
        None
    };
    let reasoning = if has_column(&df, "reasoning") {
        Some(str_column(&df, "reasoning")?)
    } else {
        None
    };

    let mut markets = Vec::with_capacity(df.height());

    for row in 0..df.height() {
        let id = ids[row].clone().ok_or_else(|| DataError::InvalidRecord {
            row,
            message: "missing id".to_string(),
        })?;

        let resolution = match resolutions[row].as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(s.parse::<Resolution>().map_err(|e| DataError::InvalidRecord {
                row,
                message: e.to_string(),
            })?),
        };

        let mut prediction = Prediction {
            probability: model[row].unwrap_or(0.5),
            ..Default::default()
        };
        if let Some(c) = confidence.as_ref().and_then(|c| c[row]) {
            prediction.confidence = c;
        }
        if let Some(r) = reasoning.as_ref().and_then(|r| r[row].clone()) {
            prediction.reasoning = r;
        }

        markets.push(HistoricalMarket {
            id,
            question: questions[row].clone().unwrap_or_default(),
            created_time: created.as_ref().and_then(|c| c[row]),
            close_time: None,
            initial_probability: initial[row].unwrap_or(0.5),
            resolution,
            resolution_time: None,
            prediction,
        });
    }

    info!("Loaded {} markets from {}", markets.len(), path.display());
    Ok(markets)
}
