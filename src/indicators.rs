//! Technical indicators
//!
//! RSI with Wilder smoothing. This is the only RSI variant the monitor
//! supports; rolling-mean and other EMA flavours give different numbers for
//! the same input and are deliberately not offered.

use crate::types::PriceSeries;

/// Default RSI lookback
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Conventional oversold level
pub const DEFAULT_OVERSOLD_THRESHOLD: f64 = 30.0;

/// Wilder's smoothing: seeded with the simple mean of the first `period`
/// values, then `avg = (avg * (period - 1) + x) / period`.
pub fn wilder_smoothing(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    if period == 0 {
        result.resize(values.len(), None);
        return result;
    }

    let n = period as f64;
    let mut avg: Option<f64> = None;

    for (i, &value) in values.iter().enumerate() {
        if i + 1 < period {
            result.push(None);
        } else if i + 1 == period {
            let seed = values[..period].iter().sum::<f64>() / n;
            avg = Some(seed);
            result.push(avg);
        } else if let Some(prev) = avg {
            let next = (prev * (n - 1.0) + value) / n;
            avg = Some(next);
            result.push(avg);
        }
    }

    result
}

/// RSI for every price, `None` until `period + 1` prices are available.
/// Values are not rounded.
pub fn rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    if prices.len() < 2 {
        return vec![None; prices.len()];
    }

    let mut gains = Vec::with_capacity(prices.len() - 1);
    let mut losses = Vec::with_capacity(prices.len() - 1);

    for pair in prices.windows(2) {
        let change = pair[1] - pair[0];
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let avg_gains = wilder_smoothing(&gains, period);
    let avg_losses = wilder_smoothing(&losses, period);

    // Index 0 has no delta
    let mut rsi_values = Vec::with_capacity(prices.len());
    rsi_values.push(None);

    for (avg_gain, avg_loss) in avg_gains.into_iter().zip(avg_losses) {
        rsi_values.push(match (avg_gain, avg_loss) {
            (Some(gain), Some(loss)) => Some(rsi_from_averages(gain, loss)),
            _ => None,
        });
    }

    rsi_values
}

/// Latest RSI rounded to two decimals, or `None` for insufficient data
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    rsi_series(prices, period)
        .last()
        .copied()
        .flatten()
        .filter(|value| value.is_finite())
        .map(round2)
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Strictly below the threshold
pub fn is_oversold(rsi: f64, threshold: f64) -> bool {
    rsi < threshold
}

/// Computes the latest RSI of a price series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsiCalculator {
    period: usize,
}

impl Default for RsiCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_RSI_PERIOD)
    }
}

impl RsiCalculator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Minimum number of points for a result
    pub fn required_points(&self) -> usize {
        self.period + 1
    }

    pub fn compute(&self, series: &PriceSeries) -> Option<f64> {
        rsi(&series.prices(), self.period)
    }
}
