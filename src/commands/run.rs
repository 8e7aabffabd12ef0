//! Run command implementation

use anyhow::{Context, Result};
use rsi_monitor::Scheduler;
use tracing::{error, info};

pub fn run(config_path: String, dry_run: bool, interval_override: Option<u64>) -> Result<()> {
    info!("Starting RSI monitor");

    let mut config = super::load_config(&config_path)?;
    if let Some(interval) = interval_override {
        info!("Overriding check interval to: {}s", interval);
        config.monitor.interval_secs = interval;
    }

    let monitor = super::build_monitor(&config, dry_run)?;
    let scheduler = Scheduler::new(monitor, config.monitor.interval());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(scheduler.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C");
    }));
    drop(runtime);

    info!("Monitor stopped after {} cycle(s)", scheduler.runs());
    Ok(())
}
