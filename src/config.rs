//! Environment-backed configuration, loaded once at startup after dotenv.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct WmataConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub lines_ttl_secs: u64,
    pub stations_ttl_secs: u64,
    pub paths_ttl_secs: u64,
    pub predictions_ttl_secs: u64,
    pub max_requests_per_hour: u32,
    pub predictions_refresh_interval_secs: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub cors_allowed_origins: Vec<String>,
    pub wmata: WmataConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let wmata = WmataConfig {
            api_key: env::var("WMATA_API_KEY").context("WMATA_API_KEY is not set")?,
            base_url: var_or("WMATA_BASE_URL", "https://api.wmata.com"),
            timeout_secs: parse_var("WMATA_TIMEOUT", 30)?,
            retry_attempts: parse_var("WMATA_RETRY_ATTEMPTS", 3)?,
            lines_ttl_secs: parse_var("WMATA_CACHE_LINES_TTL", 86400)?,
            stations_ttl_secs: parse_var("WMATA_CACHE_STATIONS_TTL", 86400)?,
            paths_ttl_secs: parse_var("WMATA_CACHE_PATHS_TTL", 86400)?,
            predictions_ttl_secs: parse_var("WMATA_CACHE_PREDICTIONS_TTL", 15)?,
            max_requests_per_hour: parse_var("WMATA_RATE_LIMIT", 1000)?,
            predictions_refresh_interval_secs: parse_var("WMATA_FRONTEND_REFRESH", 30)?,
        };

        Ok(AppConfig {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8000"),
            cors_allowed_origins: var_or(
                "CORS_ALLOWED_ORIGINS",
                "http://localhost:5173,http://127.0.0.1:5173",
            )
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect(),
            wmata,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key} value: {e}")),
        Err(_) => Ok(default),
    }
}
