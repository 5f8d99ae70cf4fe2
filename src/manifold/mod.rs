//! Read-only client for the Manifold Markets API
//!
//! Fetches markets and positions and converts them into the calculator's
//! input types.
//!
//! # Example
//!
//! ```no_run
//! use forecast_kelly::manifold::{ManifoldClient, ManifoldConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ManifoldClient::new(ManifoldConfig::default())?;
//!
//!     let markets = client.get_markets(100, None).await?;
//!     let now = chrono::Utc::now().timestamp_millis();
//!     let open = markets.iter().filter(|m| m.is_open_binary(now)).count();
//!     println!("{} open binary markets", open);
//!
//!     Ok(())
//! }
//! ```

mod client;

pub use client::{ManifoldClient, ManifoldConfig, ManifoldError};

use serde::{Deserialize, Serialize};

use crate::models::{Market, Position, Resolution};

/// Market as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMarket {
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub url: Option<String>,
    /// "BINARY", "MULTIPLE_CHOICE", ...
    #[serde(default)]
    pub outcome_type: String,
    /// Current P(YES), binary markets only
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub created_time: Option<i64>,
    #[serde(default)]
    pub close_time: Option<i64>,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub resolution_time: Option<i64>,
    #[serde(default)]
    pub volume: f64,
}

impl ApiMarket {
    pub fn to_market(&self) -> Market {
        Market {
            id: self.id.clone(),
            question: self.question.clone(),
            probability: self.probability.unwrap_or(0.5),
        }
    }

    /// Binary, unresolved and not yet closed at `now_ms`
    pub fn is_open_binary(&self, now_ms: i64) -> bool {
        self.outcome_type == "BINARY"
            && !self.is_resolved
            && self.close_time.map_or(true, |close| close > now_ms)
    }

    /// Parsed resolution, `None` if unresolved or not a binary resolution
    pub fn parsed_resolution(&self) -> Option<Resolution> {
        self.resolution.as_deref().and_then(|r| r.parse().ok())
    }
}

/// Position as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPosition {
    #[serde(default)]
    pub contract_id: String,
    #[serde(default)]
    pub payout: f64,
    #[serde(default)]
    pub invested: f64,
    #[serde(default)]
    pub profit: f64,
}

impl ApiPosition {
    pub fn to_position(&self) -> Position {
        Position {
            payout: self.payout,
        }
    }
}
