use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub content_dir: PathBuf,
    pub cache_path: PathBuf,
    pub cache_flush_debounce: Duration,
    pub cache_sweep_interval: Duration,
    pub analysis_cache_ttl: Duration,
    pub personalization_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let anthropic_api_key = lookup("ANTHROPIC_API_KEY")
            .context("Required environment variable 'ANTHROPIC_API_KEY' is not set")?;

        Ok(Config {
            anthropic_api_key,
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            content_dir: lookup("CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("content")),
            cache_path: lookup("CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/ai-cache.json")),
            cache_flush_debounce: Duration::from_millis(parse_or(
                &lookup,
                "CACHE_FLUSH_DEBOUNCE_MS",
                1000,
            )?),
            cache_sweep_interval: Duration::from_secs(
                60 * parse_positive(&lookup, "CACHE_SWEEP_INTERVAL_MINUTES", 60)?,
            ),
            analysis_cache_ttl: hours(parse_or(&lookup, "ANALYSIS_CACHE_TTL_HOURS", 168)?),
            personalization_cache_ttl: hours(parse_or(
                &lookup,
                "PERSONALIZATION_CACHE_TTL_HOURS",
                168,
            )?),
        })
    }
}

fn hours(h: u64) -> Duration {
    Duration::from_secs(h * 3600)
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64> {
    let value = parse_or(lookup, key, default)?;
    anyhow::ensure!(value > 0, "{key} must be greater than zero");
    Ok(value)
}
