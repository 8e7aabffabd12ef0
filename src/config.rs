//! Configuration management
//!
//! Handles loading and parsing of the JSON configuration file with
//! environment variable support for credentials.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coingecko::client::API_BASE_URL;
use crate::common::{RateLimiterConfig, RetryPolicy};
use crate::indicators::{DEFAULT_OVERSOLD_THRESHOLD, DEFAULT_RSI_PERIOD};
use crate::types::TokenWatchEntry;

pub const ENV_COINGECKO_API_KEY: &str = "COINGECKO_API_KEY";
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Watch list
    pub tokens: Vec<TokenWatchEntry>,
}

impl Config {
    /// Load configuration from JSON file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_json(&contents)?;
        config.apply_env();
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse config JSON")
    }

    /// Load credentials from environment if set
    pub fn apply_env(&mut self) {
        if let Ok(api_key) = std::env::var(ENV_COINGECKO_API_KEY) {
            self.api.api_key = Some(api_key);
        }
        if let Ok(bot_token) = std::env::var(ENV_TELEGRAM_BOT_TOKEN) {
            self.telegram.bot_token = Some(bot_token);
        }
        if let Ok(chat_id) = std::env::var(ENV_TELEGRAM_CHAT_ID) {
            self.telegram.chat_id = Some(chat_id);
        }
    }

    /// Reject configurations the monitor cannot run with.
    ///
    /// Telegram credentials are only required when alerts will really be sent.
    pub fn validate(&self, require_alerts: bool) -> Result<()> {
        if !has_value(&self.api.api_key) {
            bail!(
                "CoinGecko API key not found (set {} or api.api_key)",
                ENV_COINGECKO_API_KEY
            );
        }

        if require_alerts {
            if !has_value(&self.telegram.bot_token) {
                bail!(
                    "Telegram bot token not found (set {} or telegram.bot_token)",
                    ENV_TELEGRAM_BOT_TOKEN
                );
            }
            if !has_value(&self.telegram.chat_id) {
                bail!(
                    "Telegram chat id not found (set {} or telegram.chat_id)",
                    ENV_TELEGRAM_CHAT_ID
                );
            }
        }

        if self.tokens.is_empty() {
            bail!("Watch list is empty: add at least one entry to 'tokens'");
        }

        let mut seen = HashSet::new();
        for token in &self.tokens {
            if token.token_id.trim().is_empty() {
                bail!("Token entry with empty token_id ({})", token.symbol);
            }
            if !seen.insert(token.token_id.as_str()) {
                bail!("Duplicate token_id in watch list: {}", token.token_id);
            }
        }

        if self.api.rate_limit.max_calls == 0 || self.api.rate_limit.period_secs == 0 {
            bail!("api.rate_limit.max_calls and api.rate_limit.period_secs must be > 0");
        }
        if self.api.timeout_secs == 0 {
            bail!("api.timeout_secs must be > 0");
        }
        if self.monitor.rsi_period == 0 {
            bail!("monitor.rsi_period must be > 0");
        }
        if !self.monitor.oversold_threshold.is_finite() {
            bail!("monitor.oversold_threshold must be a finite number");
        }
        if self.monitor.interval_secs == 0 {
            bail!("monitor.interval_secs must be > 0");
        }
        if self.monitor.initial_history_days == 0 {
            bail!("monitor.initial_history_days must be > 0");
        }

        Ok(())
    }

    pub fn token_ids(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.token_id.clone()).collect()
    }

    pub fn token(&self, token_id: &str) -> Option<&TokenWatchEntry> {
        self.tokens.iter().find(|t| t.token_id == token_id)
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Market data API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_key_header: String,
    /// Quote currency for both endpoints
    pub vs_currency: String,
    pub timeout_secs: u64,
    pub rate_limit: RateLimiterConfig,
    pub retry: RetryPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: API_BASE_URL.to_string(),
            api_key: None,
            api_key_header: "x-cg-demo-api-key".to_string(),
            vs_currency: "usd".to_string(),
            timeout_secs: 30,
            rate_limit: RateLimiterConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Telegram alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        TelegramConfig {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: None,
            chat_id: None,
            timeout_secs: 15,
        }
    }
}

/// How the refresh phase rebuilds history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStrategy {
    /// Fetch only the days missing since the newest stored point
    #[default]
    Incremental,
    /// Refetch the full window every cycle and replace stored rows
    Full,
}

/// Monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub rsi_period: usize,
    /// Alert when RSI is strictly below this value
    pub oversold_threshold: f64,
    pub interval_secs: u64,
    /// Days fetched when a token has no stored history
    pub initial_history_days: u32,
    pub refresh: RefreshStrategy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            rsi_period: DEFAULT_RSI_PERIOD,
            oversold_threshold: DEFAULT_OVERSOLD_THRESHOLD,
            interval_secs: 3600,
            initial_history_days: 59,
            refresh: RefreshStrategy::Incremental,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Price store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            db_path: PathBuf::from("data/market_data.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "api": { "api_key": "demo" },
        "tokens": [
            { "token_id": "bitcoin", "name": "Bitcoin", "symbol": "BTC" }
        ]
    }"#;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = Config::from_json(MINIMAL).unwrap();

        assert_eq!(config.api.base_url, API_BASE_URL);
        assert_eq!(config.api.rate_limit.max_calls, 25);
        assert_eq!(config.api.rate_limit.period_secs, 60);
        assert_eq!(config.monitor.rsi_period, 14);
        assert_eq!(config.monitor.oversold_threshold, 30.0);
        assert_eq!(config.monitor.interval(), Duration::from_secs(3600));
        assert_eq!(config.monitor.refresh, RefreshStrategy::Incremental);
        assert_eq!(config.store.db_path, PathBuf::from("data/market_data.db"));
        assert_eq!(config.token_ids(), vec!["bitcoin".to_string()]);
    }

    #[test]
    fn test_minimal_config_valid_in_dry_run() {
        let config = Config::from_json(MINIMAL).unwrap();
        assert!(config.validate(false).is_ok());
        // Alerts need Telegram credentials
        assert!(config.validate(true).is_err());
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let mut config = Config::from_json(MINIMAL).unwrap();
        config.api.api_key = None;
        let err = config.validate(false).unwrap_err();
        assert!(err.to_string().contains("API key"));

        config.api.api_key = Some("   ".to_string());
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_rejects_bad_watch_list() {
        let mut config = Config::from_json(MINIMAL).unwrap();
        config.tokens.push(config.tokens[0].clone());
        assert!(config.validate(false).is_err());

        config.tokens.clear();
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_rejects_zero_settings() {
        let mut config = Config::from_json(MINIMAL).unwrap();
        config.monitor.rsi_period = 0;
        assert!(config.validate(false).is_err());

        let mut config = Config::from_json(MINIMAL).unwrap();
        config.api.rate_limit.max_calls = 0;
        assert!(config.validate(false).is_err());

        let mut config = Config::from_json(MINIMAL).unwrap();
        config.monitor.interval_secs = 0;
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_parses_full_refresh_and_retry() {
        let json = r#"{
            "api": {
                "api_key": "demo",
                "retry": { "max_attempts": 5, "backoff": "fixed" }
            },
            "monitor": { "refresh": "full", "oversold_threshold": 25.5 },
            "tokens": []
        }"#;

        let config = Config::from_json(json).unwrap();
        assert_eq!(config.monitor.refresh, RefreshStrategy::Full);
        assert_eq!(config.monitor.oversold_threshold, 25.5);
        assert_eq!(config.api.retry.max_attempts, 5);
        assert_eq!(config.api.retry.backoff, crate::common::Backoff::Fixed);
        assert_eq!(config.api.retry.base_delay_ms, 2_000);
    }

    #[test]
    fn test_token_lookup() {
        let config = Config::from_json(MINIMAL).unwrap();
        assert_eq!(config.token("bitcoin").map(|t| t.symbol.as_str()), Some("BTC"));
        assert!(config.token("dogecoin").is_none());
    }
}
