//! CoinGecko response models

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::FetchError;
use crate::types::HistoricalPrice;

/// `GET /coins/{id}/market_chart`
#[derive(Debug, Deserialize)]
pub struct MarketChartResponse {
    #[serde(default)]
    pub prices: Vec<(f64, f64)>,
}

impl MarketChartResponse {
    pub fn into_history(self) -> Vec<HistoricalPrice> {
        self.prices
            .into_iter()
            .filter(|(_, price)| price.is_finite())
            .map(|(timestamp_ms, price)| HistoricalPrice {
                timestamp_ms: timestamp_ms as i64,
                price,
            })
            .collect()
    }
}

/// `GET /simple/price`: `{ "bitcoin": { "usd": 37000.0 }, ... }`
pub type SimplePriceResponse = HashMap<String, HashMap<String, serde_json::Value>>;

pub fn parse_market_chart(body: &str) -> Result<Vec<HistoricalPrice>, FetchError> {
    let response: MarketChartResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(response.into_history())
}

/// Extract the `vs_currency` quote per token, skipping tokens without one
pub fn parse_simple_price(
    body: &str,
    vs_currency: &str,
) -> Result<HashMap<String, f64>, FetchError> {
    let response: SimplePriceResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    Ok(response
        .into_iter()
        .filter_map(|(token_id, quotes)| {
            quotes
                .get(vs_currency)
                .and_then(serde_json::Value::as_f64)
                .filter(|price| price.is_finite())
                .map(|price| (token_id, price))
        })
        .collect())
}
