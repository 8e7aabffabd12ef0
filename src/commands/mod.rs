//! Subcommand implementations

pub mod export;
pub mod once;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use rsi_monitor::alerts::{LogSink, Notifier, TelegramSink};
use rsi_monitor::coingecko::CoinGeckoClient;
use rsi_monitor::{Config, MarketMonitor, PriceStore};
use tracing::{info, warn};

pub type LiveMonitor = MarketMonitor<CoinGeckoClient, Notifier>;

/// Load and apply environment overrides, without validating
pub fn load_config(config_path: &str) -> Result<Config> {
    let config = Config::from_file(config_path)?;
    info!("Loaded configuration from: {}", config_path);
    Ok(config)
}

/// Wire the store, API client and alert sink into a monitor.
///
/// Must be called outside of the async runtime: the HTTP clients are blocking.
pub fn build_monitor(config: &Config, dry_run: bool) -> Result<LiveMonitor> {
    config.validate(!dry_run)?;

    let store = PriceStore::open(&config.store.db_path)
        .with_context(|| format!("Failed to open {}", config.store.db_path.display()))?;

    let client = CoinGeckoClient::new(&config.api).context("Failed to build API client")?;

    let notifier = if dry_run {
        warn!("Dry run: alerts are logged, not sent");
        Notifier::Log(LogSink)
    } else {
        match TelegramSink::from_config(&config.telegram)? {
            Some(sink) => Notifier::Telegram(sink),
            None => anyhow::bail!("Telegram credentials missing"),
        }
    };

    info!(
        "Watching {} tokens: {}",
        config.tokens.len(),
        config
            .tokens
            .iter()
            .map(|t| t.symbol.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(MarketMonitor::from_config(config, store, client, notifier))
}
