//! HTTP client with rate limiting for the Manifold Markets API

use super::{ApiMarket, ApiPosition};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://api.manifold.markets/v0";

/// Client errors
#[derive(Debug, Error)]
pub enum ManifoldError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ManifoldConfig {
    pub base_url: String,
    /// Minimum delay between requests in milliseconds
    pub delay_ms: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Max retry attempts
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for ManifoldConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            delay_ms: 500,
            timeout_secs: 30,
            max_retries: 3,
            user_agent: concat!("forecast-kelly/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Read-only Manifold client with rate limiting
pub struct ManifoldClient {
    client: reqwest::Client,
    config: ManifoldConfig,
    last_request: Arc<Mutex<Instant>>,
}

impl ManifoldClient {
    /// Create a new client with the given configuration
    pub fn new(config: ManifoldConfig) -> Result<Self, ManifoldError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        let now = Instant::now();
        let last = now.checked_sub(Duration::from_millis(config.delay_ms)).unwrap_or(now);

        Ok(Self {
            client,
            config,
            last_request: Arc::new(Mutex::new(last)),
        })
    }

    /// Wait for rate limit
    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        let delay = Duration::from_millis(self.config.delay_ms);

        if elapsed < delay {
            tokio::time::sleep(delay - elapsed).await;
        }

        *last = Instant::now();
    }

    /// Build URL for an API path
    fn build_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ManifoldError> {
        let base = self.config.base_url.trim_end_matches('/');
        let raw = format!("{}/{}", base, path.trim_start_matches('/'));
        let parsed = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        parsed.map_err(|e| ManifoldError::InvalidUrl(e.to_string()))
    }

    /// Fetch and decode JSON with rate limiting and retry
    async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ManifoldError> {
        for attempt in 0..self.config.max_retries {
            self.wait_for_rate_limit().await;

            match self.client.get(url.clone()).send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        return response.json::<T>().await.map_err(ManifoldError::RequestFailed);
                    }
                    tracing::warn!(
                        "Request to {} failed with status {} (attempt {}/{})",
                        url,
                        response.status(),
                        attempt + 1,
                        self.config.max_retries
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Request to {} failed (attempt {}/{}): {}",
                        url,
                        attempt + 1,
                        self.config.max_retries,
                        e
                    );
                }
            }

            if attempt + 1 < self.config.max_retries {
                let backoff = Duration::from_millis(self.config.delay_ms * (attempt as u64 + 1));
                tokio::time::sleep(backoff).await;
            }
        }

        Err(ManifoldError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.config.max_retries,
        })
    }

    fn markets_url(&self, limit: usize, before: Option<&str>) -> Result<Url, ManifoldError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }
        self.build_url("markets", &query)
    }

    fn search_url(&self, term: &str, limit: usize, filter: &str) -> Result<Url, ManifoldError> {
        self.build_url(
            "search-markets",
            &[
                ("term", term.to_string()),
                ("limit", limit.to_string()),
                ("filter", filter.to_string()),
            ],
        )
    }

    /// List markets, newest first; `before` is a market id to page from
    pub async fn get_markets(
        &self,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<ApiMarket>, ManifoldError> {
        let url = self.markets_url(limit, before)?;
        let markets: Vec<ApiMarket> = self.fetch_json(url).await?;
        tracing::info!("Fetched {} markets", markets.len());
        Ok(markets)
    }

    /// Fetch a single market
    pub async fn get_market(&self, market_id: &str) -> Result<ApiMarket, ManifoldError> {
        let url = self.build_url(&format!("market/{}", market_id), &[])?;
        let market: ApiMarket = self.fetch_json(url).await?;
        tracing::info!("Fetched market: {}", market.question);
        Ok(market)
    }

    /// Search markets by term; `filter` is one of Manifold's search filters
    /// such as "all", "open" or "resolved"
    pub async fn search_markets(
        &self,
        term: &str,
        limit: usize,
        filter: &str,
    ) -> Result<Vec<ApiMarket>, ManifoldError> {
        let url = self.search_url(term, limit, filter)?;
        let markets: Vec<ApiMarket> = self.fetch_json(url).await?;
        tracing::info!("Found {} markets for '{}'", markets.len(), term);
        Ok(markets)
    }

    /// Fetch a user's positions
    pub async fn get_user_positions(
        &self,
        username: &str,
    ) -> Result<Vec<ApiPosition>, ManifoldError> {
        let url = self.build_url(&format!("user/{}/positions", username), &[])?;
        self.fetch_json(url).await
    }
}
