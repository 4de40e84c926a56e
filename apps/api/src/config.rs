use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
/// Every variable is optional; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Per-request timeout for logo and signature fetches.
    pub asset_fetch_timeout_secs: u64,
    /// Remote images larger than this are dropped.
    pub asset_max_bytes: usize,
    /// Maximum accepted request body.
    pub body_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            asset_fetch_timeout_secs: 8,
            asset_max_bytes: 5 * 1024 * 1024,
            body_limit_bytes: 2 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        Ok(Config {
            port: env_or("PORT", defaults.port)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            asset_fetch_timeout_secs: env_or(
                "ASSET_FETCH_TIMEOUT_SECS",
                defaults.asset_fetch_timeout_secs,
            )?,
            asset_max_bytes: env_or("ASSET_MAX_BYTES", defaults.asset_max_bytes)?,
            body_limit_bytes: env_or("BODY_LIMIT_BYTES", defaults.body_limit_bytes)?,
        })
    }

    pub fn asset_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.asset_fetch_timeout_secs)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'"))
}
