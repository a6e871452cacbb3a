//! Process configuration loaded from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Dispatcher configuration.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: Postgres connection string (required)
/// - `DISPATCH_INTERVAL_MS`: pause between dispatch passes (default: `500`)
/// - `DISPATCH_BATCH_SIZE`: messages fetched per pass (default: `100`)
/// - `METRICS_ADDR`: Prometheus listener address (default: `"0.0.0.0:9000"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub dispatch_interval: Duration,
    pub batch_size: usize,
    pub metrics_addr: SocketAddr,
    pub log_format: LogFormat,
    pub log_level: String,
}

impl Config {
    pub const DEFAULT_INTERVAL_MS: u64 = 500;
    pub const DEFAULT_BATCH_SIZE: usize = 100;
    pub const DEFAULT_METRICS_ADDR: &'static str = "0.0.0.0:9000";

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let interval_ms: u64 = parse_or(&lookup, "DISPATCH_INTERVAL_MS", Self::DEFAULT_INTERVAL_MS)?;
        let batch_size: usize = parse_or(&lookup, "DISPATCH_BATCH_SIZE", Self::DEFAULT_BATCH_SIZE)?;
        for (key, value) in [
            ("DISPATCH_INTERVAL_MS", interval_ms),
            ("DISPATCH_BATCH_SIZE", batch_size as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    value: "0".to_string(),
                });
            }
        }

        let metrics_addr = match lookup("METRICS_ADDR") {
            Some(raw) => parse(&raw, "METRICS_ADDR")?,
            None => parse(Self::DEFAULT_METRICS_ADDR, "METRICS_ADDR")?,
        };

        Ok(Self {
            database_url,
            dispatch_interval: Duration::from_millis(interval_ms),
            batch_size,
            metrics_addr,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Text)?,
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse<T: FromStr>(raw: &str, key: &'static str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse(&raw, key),
        None => Ok(default),
    }
}
