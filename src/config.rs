//! Application configuration
//!
//! Loaded from a TOML file with `COINFOLIO__`-prefixed environment
//! overrides; every field has a default so an empty file is a valid config.

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path.
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_binance_url")]
    pub binance_url: String,
    #[serde(default = "default_rate_url")]
    pub rate_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address for `serve`.
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_db_path() -> String {
    "data/coinfolio.db".to_string()
}

fn default_binance_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_rate_url() -> String {
    "https://api.manana.kr".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            binance_url: default_binance_url(),
            rate_url: default_rate_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Config {
    /// Load from a TOML file (optional) merged with environment overrides
    /// like `COINFOLIO__SERVER__BIND`.
    pub fn load(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("COINFOLIO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}
