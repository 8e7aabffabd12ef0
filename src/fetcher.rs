//! Price fetching seam
//!
//! The monitor talks to the market data API only through [`PriceFetcher`],
//! so the refresh/check logic can run against a stub in tests.

use std::collections::HashMap;

use crate::error::FetchError;
use crate::types::HistoricalPrice;

pub trait PriceFetcher {
    /// Daily price history covering the last `days` days
    fn fetch_history(
        &mut self,
        token_id: &str,
        days: u32,
    ) -> Result<Vec<HistoricalPrice>, FetchError>;

    /// Current spot price for every requested token, in one call.
    /// Tokens the API does not know are simply absent from the map.
    fn fetch_current_batch(
        &mut self,
        token_ids: &[String],
    ) -> Result<HashMap<String, f64>, FetchError>;
}

impl<F: PriceFetcher + ?Sized> PriceFetcher for Box<F> {
    fn fetch_history(
        &mut self,
        token_id: &str,
        days: u32,
    ) -> Result<Vec<HistoricalPrice>, FetchError> {
        (**self).fetch_history(token_id, days)
    }

    fn fetch_current_batch(
        &mut self,
        token_ids: &[String],
    ) -> Result<HashMap<String, f64>, FetchError> {
        (**self).fetch_current_batch(token_ids)
    }
}

/// Keep samples strictly newer than `last_timestamp` (unix seconds)
pub fn filter_newer(history: &[HistoricalPrice], last_timestamp: i64) -> Vec<HistoricalPrice> {
    history
        .iter()
        .filter(|p| p.timestamp_secs() > last_timestamp)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(secs: i64, price: f64) -> HistoricalPrice {
        HistoricalPrice {
            timestamp_ms: secs * 1000,
            price,
        }
    }

    #[test]
    fn test_filter_newer_drops_at_and_before() {
        let history = vec![sample(100, 1.0), sample(200, 2.0), sample(300, 3.0)];

        let kept = filter_newer(&history, 200);
        assert_eq!(kept, vec![sample(300, 3.0)]);
    }

    #[test]
    fn test_filter_newer_with_empty_store() {
        let history = vec![sample(100, 1.0), sample(200, 2.0)];
        assert_eq!(filter_newer(&history, 0).len(), 2);
    }
}
