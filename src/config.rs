//! Service configuration from environment variables

use thiserror::Error;

use crate::core::kelly::KellyCriterionCalculator;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// HTTP service settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_kelly_fraction: f64,
    pub min_edge: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let calculator = KellyCriterionCalculator::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_kelly_fraction: calculator.max_kelly_fraction,
            min_edge: calculator.min_edge,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

impl ServerConfig {
    /// Read `HOST`, `PORT`, `KELLY_MAX_FRACTION` and `KELLY_MIN_EDGE`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT", defaults.port)?,
            max_kelly_fraction: parse_var(
                &lookup,
                "KELLY_MAX_FRACTION",
                defaults.max_kelly_fraction,
            )?,
            min_edge: parse_var(&lookup, "KELLY_MIN_EDGE", defaults.min_edge)?,
        };

        if !(0.0..=1.0).contains(&config.max_kelly_fraction) {
            return Err(ConfigError::InvalidValue {
                key: "KELLY_MAX_FRACTION",
                value: config.max_kelly_fraction.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&config.min_edge) {
            return Err(ConfigError::InvalidValue {
                key: "KELLY_MIN_EDGE",
                value: config.min_edge.to_string(),
            });
        }

        Ok(config)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn calculator(&self) -> KellyCriterionCalculator {
        KellyCriterionCalculator::new(self.max_kelly_fraction, self.min_edge)
    }
}
