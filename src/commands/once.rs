//! Once command implementation

use anyhow::Result;
use tracing::info;

pub fn run(config_path: String, dry_run: bool) -> Result<()> {
    let config = super::load_config(&config_path)?;
    let mut monitor = super::build_monitor(&config, dry_run)?;

    info!("Running single market check...");
    let report = monitor.run_cycle()?;

    println!("\n{}", "=".repeat(60));
    println!("MARKET CHECK");
    println!("{}", "=".repeat(60));
    println!("{}", report);
    println!("{}", "=".repeat(60));

    Ok(())
}
