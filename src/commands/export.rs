//! Export command implementation

use anyhow::{bail, Context, Result};
use rsi_monitor::PriceStore;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Serialize)]
struct ExportRow<'a> {
    token_id: &'a str,
    token_name: &'a str,
    token_symbol: &'a str,
    timestamp: i64,
    datetime_utc: String,
    price: f64,
}

pub fn run(config_path: String, token_id: String, output: PathBuf) -> Result<()> {
    let config = super::load_config(&config_path)?;
    let store = PriceStore::open(&config.store.db_path)?;

    let series = store.read_series(&token_id)?;
    if series.is_empty() {
        bail!("No stored history for {}", token_id);
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    for point in series.iter() {
        writer.serialize(ExportRow {
            token_id: &point.token_id,
            token_name: &point.token_name,
            token_symbol: &point.token_symbol,
            timestamp: point.timestamp,
            datetime_utc: point.datetime_utc(),
            price: point.price,
        })?;
    }
    writer.flush()?;

    info!(
        "Exported {} rows for {} to {}",
        series.len(),
        token_id,
        output.display()
    );
    println!("Wrote {} rows to {}", series.len(), output.display());

    Ok(())
}
