//! CoinGecko market data client
//!
//! Blocking HTTP client for the two public endpoints the monitor needs:
//! daily market charts and batched spot prices. Every request goes through
//! the sliding-window rate limiter and the shared retry policy.
//!
//! # Example
//!
//! ```no_run
//! use rsi_monitor::coingecko::CoinGeckoClient;
//! use rsi_monitor::config::ApiConfig;
//! use rsi_monitor::fetcher::PriceFetcher;
//!
//! let config = ApiConfig {
//!     api_key: Some("demo-key".to_string()),
//!     ..ApiConfig::default()
//! };
//! let mut client = CoinGeckoClient::new(&config)?;
//! let history = client.fetch_history("bitcoin", 30)?;
//! println!("Fetched {} daily prices", history.len());
//! # Ok::<(), rsi_monitor::error::FetchError>(())
//! ```

pub mod client;
pub mod types;

pub use client::CoinGeckoClient;
