//! Status command implementation
//!
//! Reads only the local store; never touches the network.

use anyhow::{bail, Result};
use rsi_monitor::indicators::RsiCalculator;
use rsi_monitor::PriceStore;

pub fn run(config_path: String) -> Result<()> {
    let config = super::load_config(&config_path)?;
    if config.tokens.is_empty() {
        bail!("Watch list is empty: add at least one entry to 'tokens'");
    }

    let store = PriceStore::open(&config.store.db_path)?;
    let calculator = RsiCalculator::new(config.monitor.rsi_period);

    println!("\n{}", "=".repeat(60));
    println!("STORED HISTORY: {}", config.store.db_path.display());
    println!("{}", "=".repeat(60));
    println!(
        "{:<8} {:<14} {:>6}  {:<20} {:>8}",
        "SYMBOL", "TOKEN", "ROWS", "LATEST (UTC)", "RSI"
    );

    for token in &config.tokens {
        let series = store.read_series(&token.token_id)?;
        let latest = series
            .last()
            .map(|p| p.datetime_utc())
            .unwrap_or_else(|| "-".to_string());
        let rsi = calculator
            .compute(&series)
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| "n/a".to_string());

        println!(
            "{:<8} {:<14} {:>6}  {:<20} {:>8}",
            token.symbol,
            token.token_id,
            series.len(),
            latest,
            rsi
        );
    }
    println!("{}", "=".repeat(60));

    Ok(())
}
