//! RSI monitor - main entry point
//!
//! This binary provides four subcommands:
//! - run: Refresh and check on a fixed schedule until Ctrl+C
//! - once: Run a single market check and print the report
//! - status: Show what is stored locally (no network)
//! - export: Write a token's stored price history to CSV

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "rsi-monitor")]
#[command(about = "Crypto price history refresh with RSI oversold alerts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "configs/market_monitor.json")]
    config: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log alerts instead of sending them to Telegram
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the monitor: one check at startup, then every interval
    Run {
        /// Check interval in seconds (overrides config file)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Run a single market check and exit
    Once,

    /// Show stored history and RSI per token
    Status,

    /// Export a token's stored history to CSV
    Export {
        /// Token id, e.g. "bitcoin"
        #[arg(short, long)]
        token: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}", log_path.display());
    Ok(())
}

fn main() -> Result<()> {
    // Credentials may live in .env
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Run { .. } => "run",
        Commands::Once => "once",
        Commands::Status => "status",
        Commands::Export { .. } => "export",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Run { interval } => commands::run::run(cli.config, cli.dry_run, interval),
        Commands::Once => commands::once::run(cli.config, cli.dry_run),
        Commands::Status => commands::status::run(cli.config),
        Commands::Export { token, output } => commands::export::run(cli.config, token, output),
    }
}
