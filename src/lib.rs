//! RSI Monitor
//!
//! Keeps a local SQLite history of daily token prices from CoinGecko,
//! computes a Wilder RSI per token on a fixed schedule, and sends a
//! Telegram alert when a token turns oversold.

pub mod alerts;
pub mod coingecko;
pub mod common;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod indicators;
pub mod monitor;
pub mod scheduler;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{MonitorError, Result};
pub use monitor::MarketMonitor;
pub use scheduler::{Job, Scheduler};
pub use store::PriceStore;
pub use types::*;
