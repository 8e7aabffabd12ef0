//! CoinGecko API Client
//!
//! Every attempt waits on the rate limiter first; failed attempts are
//! retried according to the configured [`RetryPolicy`].

use itertools::Itertools;
use reqwest::blocking::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::types::{parse_market_chart, parse_simple_price};
use crate::common::{RateLimiter, RetryPolicy};
use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::fetcher::PriceFetcher;
use crate::types::HistoricalPrice;

/// Base URL for the public CoinGecko API
pub const API_BASE_URL: &str = "https://api.coingecko.com/api/v3";

pub struct CoinGeckoClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    api_key_header: String,
    vs_currency: String,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
}

impl CoinGeckoClient {
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_key_header: config.api_key_header.clone(),
            vs_currency: config.vs_currency.clone(),
            rate_limiter: RateLimiter::from_config(&config.rate_limit),
            retry: config.retry.clone(),
        })
    }

    /// GET `path` with query parameters and return the body of a 2xx response
    fn get(&mut self, path: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let http_client = &self.http_client;
        let api_key = self.api_key.as_deref();
        let api_key_header = self.api_key_header.as_str();
        let rate_limiter = &mut self.rate_limiter;

        self.retry.run(|attempt| {
            rate_limiter.wait();
            debug!("GET {} (attempt {})", url, attempt);

            let mut request = http_client.get(&url).query(query);
            if let Some(key) = api_key {
                request = request.header(api_key_header, key);
            }

            let response = request.send()?;
            let status = response.status();
            let body = response.text()?;

            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            Ok(body)
        })
    }
}

impl PriceFetcher for CoinGeckoClient {
    fn fetch_history(
        &mut self,
        token_id: &str,
        days: u32,
    ) -> Result<Vec<HistoricalPrice>, FetchError> {
        info!("Fetching {} day(s) of historical data for {}...", days, token_id);

        let path = format!("/coins/{}/market_chart", token_id);
        let query = [
            ("vs_currency", self.vs_currency.clone()),
            ("days", days.to_string()),
            ("interval", "daily".to_string()),
        ];

        let body = self.get(&path, &query)?;
        parse_market_chart(&body)
    }

    fn fetch_current_batch(
        &mut self,
        token_ids: &[String],
    ) -> Result<HashMap<String, f64>, FetchError> {
        if token_ids.is_empty() {
            return Ok(HashMap::new());
        }

        info!("Fetching current prices for {} tokens...", token_ids.len());

        let query = [
            ("ids", token_ids.iter().join(",")),
            ("vs_currencies", self.vs_currency.clone()),
        ];

        let body = self.get("/simple/price", &query)?;
        parse_simple_price(&body, &self.vs_currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RateLimiterConfig;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    const CHART_BODY: &str = r#"{"prices":[[1705622400000,41000.5],[1705708800000,41500.0]]}"#;

    /// Serve one canned response per connection, in order. The handle yields
    /// the number of requests answered.
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, thread::JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/api/v3", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let mut served = 0;
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();

                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                        break;
                    }
                }

                let reason = match status {
                    200 => "OK",
                    404 => "Not Found",
                    _ => "Service Unavailable",
                };
                write!(
                    stream,
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                )
                .unwrap();
                stream.flush().unwrap();
                served += 1;
            }
            served
        });

        (base_url, handle)
    }

    fn local_config(base_url: String, attempts: u32) -> ApiConfig {
        ApiConfig {
            base_url,
            api_key: Some("test-key".to_string()),
            timeout_secs: 5,
            rate_limit: RateLimiterConfig::default().with_max_calls(100),
            retry: RetryPolicy::default()
                .with_max_attempts(attempts)
                .with_base_delay(Duration::from_millis(1)),
            ..ApiConfig::default()
        }
    }

    fn unreachable_config() -> ApiConfig {
        ApiConfig {
            // Nothing listens on the discard port
            base_url: "http://127.0.0.1:9/api/v3/".to_string(),
            api_key: Some("test-key".to_string()),
            timeout_secs: 2,
            rate_limit: RateLimiterConfig::default().with_max_calls(100),
            retry: RetryPolicy::none(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = CoinGeckoClient::new(&unreachable_config()).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9/api/v3");
    }

    #[test]
    fn test_empty_batch_makes_no_request() {
        let mut client = CoinGeckoClient::new(&unreachable_config()).unwrap();
        let prices = client.fetch_current_batch(&[]).unwrap();
        assert!(prices.is_empty());
        assert_eq!(client.rate_limiter.calls_in_window(), 0);
    }

    #[test]
    fn test_connection_failure_is_an_error_not_a_panic() {
        let mut client = CoinGeckoClient::new(&unreachable_config()).unwrap();
        let result = client.fetch_history("bitcoin", 5);

        assert!(matches!(result, Err(FetchError::Http(_))));
        // The attempt still counted against the window
        assert_eq!(client.rate_limiter.calls_in_window(), 1);
    }

    #[test]
    fn test_server_error_is_retried_then_succeeds() {
        let (base_url, server) = serve(vec![(503, "busy"), (200, CHART_BODY)]);
        let mut client = CoinGeckoClient::new(&local_config(base_url, 3)).unwrap();

        let history = client.fetch_history("bitcoin", 2).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].timestamp_ms, 1_705_708_800_000);
        assert_eq!(history[1].price, 41500.0);
        // One rate-limiter slot per attempt
        assert_eq!(client.rate_limiter.calls_in_window(), 2);
        assert_eq!(server.join().unwrap(), 2);
    }

    #[test]
    fn test_server_error_exhausts_attempts() {
        let (base_url, server) = serve(vec![(503, "busy"), (503, "still busy")]);
        let mut client = CoinGeckoClient::new(&local_config(base_url, 2)).unwrap();

        let result = client.fetch_history("bitcoin", 2);

        assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
        assert_eq!(client.rate_limiter.calls_in_window(), 2);
        assert_eq!(server.join().unwrap(), 2);
    }

    #[test]
    fn test_not_found_is_not_retried() {
        let (base_url, server) = serve(vec![(404, r#"{"error":"coin not found"}"#)]);
        let mut client = CoinGeckoClient::new(&local_config(base_url, 3)).unwrap();

        let result = client.fetch_history("no-such-coin", 2);

        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
        assert_eq!(client.rate_limiter.calls_in_window(), 1);
        assert_eq!(server.join().unwrap(), 1);
    }
}
