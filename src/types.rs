//! Core data types used across the monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format used for the human-readable `datetime_utc` column
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A token on the watch list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenWatchEntry {
    /// Remote API identifier, e.g. "bitcoin"
    pub token_id: String,
    pub name: String,
    pub symbol: String,
}

impl TokenWatchEntry {
    pub fn new(
        token_id: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            token_id: token_id.into(),
            name: name.into(),
            symbol: symbol.into(),
        }
    }

    /// Build a stored point for this token
    pub fn point(&self, timestamp: i64, price: f64) -> PricePoint {
        PricePoint {
            token_id: self.token_id.clone(),
            token_name: self.name.clone(),
            token_symbol: self.symbol.clone(),
            timestamp,
            price,
        }
    }
}

/// One stored price sample. `(token_id, timestamp)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub token_id: String,
    pub token_name: String,
    pub token_symbol: String,
    /// Unix seconds
    pub timestamp: i64,
    pub price: f64,
}

impl PricePoint {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// `datetime_utc` column value
    pub fn datetime_utc(&self) -> String {
        self.datetime()
            .map(|dt| dt.format(DATETIME_FORMAT).to_string())
            .unwrap_or_default()
    }
}

/// Raw sample from the market chart endpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoricalPrice {
    pub timestamp_ms: i64,
    pub price: f64,
}

impl HistoricalPrice {
    pub fn timestamp_secs(&self) -> i64 {
        self.timestamp_ms.div_euclid(1000)
    }
}

/// Price points of a single token, ascending and unique by timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort by timestamp and drop repeated timestamps (first one wins)
    pub fn from_points(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        points.dedup_by_key(|p| p.timestamp);
        Self { points }
    }

    /// Append a point. Returns false (and leaves the series untouched) when the
    /// point is not strictly newer than the last one.
    pub fn push(&mut self, point: PricePoint) -> bool {
        if let Some(last) = self.points.last() {
            if point.timestamp <= last.timestamp {
                return false;
            }
        }
        self.points.push(point);
        true
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn into_points(self) -> Vec<PricePoint> {
        self.points
    }
}
