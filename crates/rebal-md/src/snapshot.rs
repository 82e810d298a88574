//! Pre-fetched monthly market data for one backtest window.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::factors::{compound_daily_rates, compound_monthly_rates, fixed_annual_factors, month_end_last};
use crate::provider::{ProviderError, SeriesProvider};
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::sources::{Currency, SeriesMap, SeriesSource};
use crate::{MonthlySeries, Observation, SeriesKind, SeriesRequest};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
    /// The FX series could not be fetched; nothing else is attempted.
    MissingBaseline { series: String, cause: ProviderError },
    /// `start` is after `end`.
    InvalidWindow { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::MissingBaseline { series, cause } => {
                write!(f, "baseline series {series} unavailable: {cause}")
            }
            SnapshotError::InvalidWindow { start, end } => {
                write!(f, "invalid data window: {start} > {end}")
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Result of asking the snapshot for a price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceLookup {
    /// Latest observation on or before the date.
    Price(f64),
    /// The ticker has a series but nothing on or before the date.
    Stale,
    /// The ticker has no series at all.
    Untracked,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    fx: MonthlySeries,
    series: BTreeMap<String, MonthlySeries>,
    /// Tickers whose series could not be fetched, with the reason.
    skipped: Vec<(String, String)>,
}

impl MarketSnapshot {
    pub fn new(fx: MonthlySeries) -> Self {
        Self {
            fx,
            ..Self::default()
        }
    }

    pub fn insert(&mut self, ticker: impl Into<String>, series: MonthlySeries) {
        self.series.insert(ticker.into(), series);
    }

    pub fn with_series(mut self, ticker: impl Into<String>, series: MonthlySeries) -> Self {
        self.insert(ticker, series);
        self
    }

    pub fn fx(&self) -> &MonthlySeries {
        &self.fx
    }

    pub fn series(&self, ticker: &str) -> Option<&MonthlySeries> {
        self.series.get(ticker)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn skipped(&self) -> &[(String, String)] {
        &self.skipped
    }

    pub fn price_at(&self, ticker: &str, date: NaiveDate) -> PriceLookup {
        match self.series.get(ticker) {
            None => PriceLookup::Untracked,
            Some(s) => match s.latest_at_or_before(date) {
                Some(v) => PriceLookup::Price(v),
                None => PriceLookup::Stale,
            },
        }
    }

    /// Fetch every series the `(ticker, geography)` universe needs.
    ///
    /// The FX series is fetched first and is required. Per-ticker failures
    /// are logged and the ticker is left without a series.
    pub fn fetch<'a, I>(
        universe: I,
        map: &SeriesMap,
        provider: &dyn SeriesProvider,
        fx_symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        retry: RetryPolicy,
    ) -> Result<Self, SnapshotError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if start > end {
            return Err(SnapshotError::InvalidWindow { start, end });
        }

        let fx_req = SeriesRequest::new(fx_symbol, SeriesKind::Price, start, end);
        let fx_obs = fetch_with_retry(provider, &fx_req, retry).map_err(|cause| {
            SnapshotError::MissingBaseline {
                series: fx_symbol.to_string(),
                cause,
            }
        })?;
        let mut snap = MarketSnapshot::new(month_end_last(&fx_obs));
        info!(series = fx_symbol, months = snap.fx.len(), "fx series loaded");

        let mut cache: HashMap<(String, SeriesKind), Result<Vec<Observation>, ProviderError>> =
            HashMap::new();

        for (ticker, geography) in universe {
            if snap.series.contains_key(ticker) {
                continue;
            }
            let source = map.resolve(ticker, geography);
            let (id, kind) = match &source {
                SeriesSource::Untracked => {
                    debug!(ticker, geography, "no series for ticker");
                    continue;
                }
                SeriesSource::FixedAnnual { rate } => {
                    snap.insert(ticker, fixed_annual_factors(start, end, *rate));
                    continue;
                }
                SeriesSource::DailyRate { code } => (code.clone(), SeriesKind::DailyRate),
                SeriesSource::MonthlyRate { code } => (code.clone(), SeriesKind::MonthlyRate),
                SeriesSource::Market { symbol, .. } => (symbol.clone(), SeriesKind::Price),
            };

            let raw = cache
                .entry((id.clone(), kind))
                .or_insert_with(|| {
                    fetch_with_retry(provider, &SeriesRequest::new(&id, kind, start, end), retry)
                })
                .clone();

            let obs = match raw {
                Ok(obs) => obs,
                Err(e) => {
                    warn!(ticker, series = %id, error = %e, "no data for ticker; price stays fixed");
                    snap.skipped.push((ticker.to_string(), e.to_string()));
                    continue;
                }
            };

            let series = match &source {
                SeriesSource::DailyRate { .. } => compound_daily_rates(&obs),
                SeriesSource::MonthlyRate { .. } => compound_monthly_rates(&obs),
                SeriesSource::Market {
                    currency: Currency::Usd,
                    ..
                } => to_local_currency(&month_end_last(&obs), &snap.fx),
                _ => month_end_last(&obs),
            };
            debug!(ticker, series = %id, months = series.len(), "series loaded");
            snap.insert(ticker, series);
        }

        Ok(snap)
    }
}

/// Multiply each month-end USD value by the same month's FX rate. Months
/// without an FX point are dropped.
pub fn to_local_currency(usd: &MonthlySeries, fx: &MonthlySeries) -> MonthlySeries {
    usd.iter()
        .filter_map(|(d, v)| fx.get(d).map(|rate| (d, v * rate)))
        .collect()
}
