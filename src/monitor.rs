//! Market monitor
//!
//! One cycle = refresh stored history for every watched token, then check
//! RSI against the current spot price and alert on oversold tokens. Tokens
//! are processed one at a time; a failure for one token never stops the
//! others. Only store errors abort the cycle.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use tracing::{error, info, warn};

use crate::alerts::{format_oversold_alert, AlertSink};
use crate::config::{Config, MonitorConfig, RefreshStrategy};
use crate::error::Result;
use crate::fetcher::{filter_newer, PriceFetcher};
use crate::indicators::{is_oversold, RsiCalculator};
use crate::scheduler::Job;
use crate::store::PriceStore;
use crate::types::{HistoricalPrice, PricePoint, TokenWatchEntry};

const SECONDS_PER_DAY: i64 = 86_400;

/// Result of the refresh phase for one token
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Updated { inserted: usize },
    UpToDate,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenRefresh {
    pub token_id: String,
    pub outcome: RefreshOutcome,
}

/// Result of the check phase for one token
#[derive(Debug, Clone, PartialEq)]
pub enum CheckStatus {
    Computed { rsi: f64 },
    Oversold { rsi: f64, alert_sent: bool },
    InsufficientData { points: usize },
    NoHistory,
    NoCurrentPrice,
}

impl CheckStatus {
    pub fn rsi(&self) -> Option<f64> {
        match self {
            CheckStatus::Computed { rsi } | CheckStatus::Oversold { rsi, .. } => Some(*rsi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenCheck {
    pub token_id: String,
    pub symbol: String,
    pub status: CheckStatus,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub refresh: Vec<TokenRefresh>,
    pub checks: Vec<TokenCheck>,
}

impl CycleReport {
    pub fn check_for(&self, token_id: &str) -> Option<&TokenCheck> {
        self.checks.iter().find(|c| c.token_id == token_id)
    }

    pub fn refresh_for(&self, token_id: &str) -> Option<&TokenRefresh> {
        self.refresh.iter().find(|r| r.token_id == token_id)
    }

    pub fn alerts(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Oversold { .. }))
            .count()
    }

    pub fn failed_refreshes(&self) -> usize {
        self.refresh
            .iter()
            .filter(|r| matches!(r.outcome, RefreshOutcome::Failed(_)))
            .count()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Cycle #{} started {}",
            self.cycle,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        for check in &self.checks {
            let status = match &check.status {
                CheckStatus::Computed { rsi } => format!("RSI {:.2}", rsi),
                CheckStatus::Oversold { rsi, alert_sent } => format!(
                    "RSI {:.2} OVERSOLD (alert {})",
                    rsi,
                    if *alert_sent { "sent" } else { "failed" }
                ),
                CheckStatus::InsufficientData { points } => {
                    format!("insufficient data ({} points)", points)
                }
                CheckStatus::NoHistory => "no history".to_string(),
                CheckStatus::NoCurrentPrice => "no current price".to_string(),
            };
            writeln!(f, "  {:<8} {}", check.symbol, status)?;
        }
        write!(
            f,
            "  {} alert(s), {} failed refresh(es)",
            self.alerts(),
            self.failed_refreshes()
        )
    }
}

/// Start of the UTC day containing `now`, in unix seconds
fn day_start(now: DateTime<Utc>) -> i64 {
    let ts = now.timestamp();
    ts - ts.rem_euclid(SECONDS_PER_DAY)
}

pub struct MarketMonitor<F, S> {
    tokens: Vec<TokenWatchEntry>,
    settings: MonitorConfig,
    store: PriceStore,
    fetcher: F,
    sink: S,
    calculator: RsiCalculator,
    cycles: u64,
}

impl<F: PriceFetcher, S: AlertSink> MarketMonitor<F, S> {
    pub fn new(
        tokens: Vec<TokenWatchEntry>,
        settings: MonitorConfig,
        store: PriceStore,
        fetcher: F,
        sink: S,
    ) -> Self {
        let calculator = RsiCalculator::new(settings.rsi_period);
        Self {
            tokens,
            settings,
            store,
            fetcher,
            sink,
            calculator,
            cycles: 0,
        }
    }

    pub fn from_config(config: &Config, store: PriceStore, fetcher: F, sink: S) -> Self {
        Self::new(
            config.tokens.clone(),
            config.monitor.clone(),
            store,
            fetcher,
            sink,
        )
    }

    pub fn store(&self) -> &PriceStore {
        &self.store
    }

    pub fn tokens(&self) -> &[TokenWatchEntry] {
        &self.tokens
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now())
    }

    /// Refresh then check, as of `now`
    pub fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        self.cycles += 1;
        info!("--- Cycle #{}: starting market check ---", self.cycles);

        let refresh = self.refresh(now)?;
        let checks = self.check(now)?;

        info!("--- Cycle #{}: market check complete ---", self.cycles);
        Ok(CycleReport {
            cycle: self.cycles,
            started_at: now,
            refresh,
            checks,
        })
    }

    /// Bring stored daily history up to the start of the current UTC day
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Result<Vec<TokenRefresh>> {
        info!(
            "Refreshing historical data ({:?} strategy)",
            self.settings.refresh
        );

        let cutoff = day_start(now);
        let tokens = self.tokens.clone();
        let mut results = Vec::with_capacity(tokens.len());

        for token in &tokens {
            let outcome = match self.settings.refresh {
                RefreshStrategy::Incremental => self.refresh_incremental(token, cutoff)?,
                RefreshStrategy::Full => self.refresh_full(token, cutoff)?,
            };
            results.push(TokenRefresh {
                token_id: token.token_id.clone(),
                outcome,
            });
        }

        info!("Historical data refresh complete");
        Ok(results)
    }

    fn refresh_incremental(
        &mut self,
        token: &TokenWatchEntry,
        cutoff: i64,
    ) -> Result<RefreshOutcome> {
        let last = self.store.latest_timestamp(&token.token_id)?;

        let days = if last > 0 {
            let missing = (cutoff - last).div_euclid(SECONDS_PER_DAY);
            if missing <= 0 {
                info!("Data for {} is already up to date", token.token_id);
                return Ok(RefreshOutcome::UpToDate);
            }
            // Include the day of the last stored point
            missing as u32 + 1
        } else {
            self.settings.initial_history_days
        };

        let history = match self.fetcher.fetch_history(&token.token_id, days) {
            Ok(history) => history,
            Err(e) => {
                warn!("Failed to fetch history for {}: {}", token.token_id, e);
                return Ok(RefreshOutcome::Failed(e.to_string()));
            }
        };

        let points = closed_points(token, &filter_newer(&history, last), cutoff);
        let inserted = self.store.upsert(&points)?;
        info!(
            "Inserted {} new historical price points for {}",
            inserted, token.token_id
        );

        Ok(RefreshOutcome::Updated { inserted })
    }

    fn refresh_full(&mut self, token: &TokenWatchEntry, cutoff: i64) -> Result<RefreshOutcome> {
        let days = self.settings.initial_history_days;

        let history = match self.fetcher.fetch_history(&token.token_id, days) {
            Ok(history) => history,
            Err(e) => {
                // Keep whatever is stored; the next cycle tries again
                warn!("Failed to fetch history for {}: {}", token.token_id, e);
                return Ok(RefreshOutcome::Failed(e.to_string()));
            }
        };

        let points = closed_points(token, &history, cutoff);
        if points.is_empty() {
            warn!(
                "No historical data returned for {}; keeping stored rows",
                token.token_id
            );
            return Ok(RefreshOutcome::Failed("empty history".to_string()));
        }

        let inserted = self.store.replace(&token.token_id, &points)?;
        info!(
            "Rebuilt history for {} with {} price points",
            token.token_id, inserted
        );

        Ok(RefreshOutcome::Updated { inserted })
    }

    /// Compute RSI with the current price appended and alert on oversold
    pub fn check(&mut self, now: DateTime<Utc>) -> Result<Vec<TokenCheck>> {
        let token_ids: Vec<String> = self.tokens.iter().map(|t| t.token_id.clone()).collect();

        let current_prices = match self.fetcher.fetch_current_batch(&token_ids) {
            Ok(prices) => prices,
            Err(e) => {
                warn!("API error while fetching current prices: {}", e);
                HashMap::new()
            }
        };

        if current_prices.is_empty() {
            warn!("Could not fetch current prices. Skipping market check.");
            return Ok(self
                .tokens
                .iter()
                .map(|t| TokenCheck {
                    token_id: t.token_id.clone(),
                    symbol: t.symbol.clone(),
                    status: CheckStatus::NoCurrentPrice,
                })
                .collect());
        }

        let tokens = self.tokens.clone();
        let mut checks = Vec::with_capacity(tokens.len());

        for token in &tokens {
            let status = self.check_token(token, current_prices.get(&token.token_id), now)?;
            checks.push(TokenCheck {
                token_id: token.token_id.clone(),
                symbol: token.symbol.clone(),
                status,
            });
        }

        Ok(checks)
    }

    fn check_token(
        &mut self,
        token: &TokenWatchEntry,
        current_price: Option<&f64>,
        now: DateTime<Utc>,
    ) -> Result<CheckStatus> {
        let symbol = token.symbol.as_str();
        info!("Processing token: {}", symbol);

        let mut series = self.store.read_series(&token.token_id)?;
        if series.is_empty() {
            warn!("No historical data for {}. Skipping.", symbol);
            return Ok(CheckStatus::NoHistory);
        }

        let Some(&price) = current_price else {
            warn!("No current price for {}. Skipping.", symbol);
            return Ok(CheckStatus::NoCurrentPrice);
        };

        if !series.push(token.point(now.timestamp(), price)) {
            warn!(
                "Current price for {} is not newer than stored history; using history only",
                symbol
            );
        }

        let Some(rsi) = self.calculator.compute(&series) else {
            info!(
                "Could not calculate RSI for {}: {} points, need {}",
                symbol,
                series.len(),
                self.calculator.required_points()
            );
            return Ok(CheckStatus::InsufficientData {
                points: series.len(),
            });
        };

        info!("RSI for {}: {:.2}", symbol, rsi);

        if !is_oversold(rsi, self.settings.oversold_threshold) {
            return Ok(CheckStatus::Computed { rsi });
        }

        warn!("ALERT: {} is oversold with RSI: {:.2}", symbol, rsi);
        let alert_sent = match self.sink.send(&format_oversold_alert(symbol, rsi)) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to deliver alert for {}: {}", symbol, e);
                false
            }
        };

        Ok(CheckStatus::Oversold { rsi, alert_sent })
    }
}

/// Samples at or before `cutoff`, as stored points. The intraday sample the
/// API appends for "now" is left out.
fn closed_points(
    token: &TokenWatchEntry,
    history: &[HistoricalPrice],
    cutoff: i64,
) -> Vec<PricePoint> {
    history
        .iter()
        .filter(|p| p.timestamp_secs() <= cutoff)
        .map(|p| token.point(p.timestamp_secs(), p.price))
        .collect()
}

impl<F, S> Job for MarketMonitor<F, S>
where
    F: PriceFetcher + Send + 'static,
    S: AlertSink + Send + 'static,
{
    fn name(&self) -> &str {
        "market-check"
    }

    fn run(&mut self) -> Result<()> {
        let report = self.run_cycle()?;
        info!(
            "Cycle #{} done: {} alert(s), {} failed refresh(es)",
            report.cycle,
            report.alerts(),
            report.failed_refreshes()
        );
        Ok(())
    }
}
