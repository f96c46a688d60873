//! Application configuration loaded from environment variables.

use thiserror::Error;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid {
                key: "LOG_FORMAT",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — Postgres connection string; unset runs on the in-memory store
/// - `JWT_SECRET` — HS256 signing secret (required)
/// - `PAYMENT_SERVICE_URL` — payment gateway base URL; unset approves in memory
/// - `PAYMENT_CURRENCY` — currency sent with each authorization (default: `"USD"`)
/// - `PAYMENT_TOKEN` — payment token forwarded to the gateway (default: empty)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub payment_service_url: Option<String>,
    pub payment_currency: String,
    pub payment_token: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(p) => p.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: p,
            })?,
            None => defaults.port,
        };

        let log_format = match non_empty("LOG_FORMAT") {
            Some(f) => f.parse()?,
            None => defaults.log_format,
        };

        Ok(Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port,
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: non_empty("DATABASE_URL"),
            jwt_secret: non_empty("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            payment_service_url: non_empty("PAYMENT_SERVICE_URL"),
            payment_currency: non_empty("PAYMENT_CURRENCY").unwrap_or(defaults.payment_currency),
            payment_token: non_empty("PAYMENT_TOKEN").unwrap_or(defaults.payment_token),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            jwt_secret: String::new(),
            payment_service_url: None,
            payment_currency: "USD".to_string(),
            payment_token: String::new(),
        }
    }
}
