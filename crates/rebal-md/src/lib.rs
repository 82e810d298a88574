//! rebal-md
//!
//! Monthly price / growth-factor series for the backtest.
//!
//! This crate owns the provider abstraction, the concrete providers (CSV
//! directory, BCB SGS HTTP, chart HTTP), the ticker → series routing and the conversion
//! of raw observations into month-end indexed series. The simulator only ever
//! sees a [`MarketSnapshot`].

pub mod chart;
pub mod factors;
pub mod ingest_csv;
pub mod provider;
pub mod retry;
pub mod sgs;
pub mod snapshot;
pub mod sources;

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub use chart::ChartProvider;
pub use factors::{compound_daily_rates, compound_monthly_rates, fixed_annual_factors, month_end_last};
pub use ingest_csv::CsvSeriesProvider;
pub use provider::{CompositeProvider, ProviderError, SeriesProvider};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use sgs::SgsProvider;
pub use snapshot::{MarketSnapshot, PriceLookup, SnapshotError};
pub use sources::{Currency, SeriesMap, SeriesSource};

/// What a provider is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    /// Adjusted close prices.
    Price,
    /// Percent per business day (e.g. SGS 4390).
    DailyRate,
    /// Percent per month (e.g. SGS 433).
    MonthlyRate,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesKind::Price => "price",
            SeriesKind::DailyRate => "daily_rate",
            SeriesKind::MonthlyRate => "monthly_rate",
        }
    }

    pub fn is_rate(&self) -> bool {
        !matches!(self, SeriesKind::Price)
    }
}

/// Parameters for one series fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesRequest {
    /// Market symbol (`BOVA11.SA`) or rate series code (`4390`).
    pub id: String,
    pub kind: SeriesKind,
    /// Inclusive.
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
}

impl SeriesRequest {
    pub fn new(id: impl Into<String>, kind: SeriesKind, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            id: id.into(),
            kind,
            start,
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// One raw data point as returned by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Month-end indexed series (price or cumulative growth factor).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlySeries {
    points: BTreeMap<NaiveDate, f64>,
}

impl MonthlySeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) the value at `date`.
    pub fn insert(&mut self, date: NaiveDate, value: f64) {
        self.points.insert(date, value);
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points.get(&date).copied()
    }

    /// Value of the latest point dated on or before `date`.
    pub fn latest_at_or_before(&self, date: NaiveDate) -> Option<f64> {
        self.points.range(..=date).next_back().map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.keys().next().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().map(|(d, v)| (*d, *v))
    }
}

impl FromIterator<(NaiveDate, f64)> for MonthlySeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Last calendar day of `date`'s month.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

/// First day of `date`'s month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_end_handles_december_and_leap_years() {
        assert_eq!(month_end(d(2024, 2, 10)), d(2024, 2, 29));
        assert_eq!(month_end(d(2023, 2, 1)), d(2023, 2, 28));
        assert_eq!(month_end(d(2024, 12, 31)), d(2024, 12, 31));
        assert_eq!(month_start(d(2024, 7, 19)), d(2024, 7, 1));
    }

    #[test]
    fn latest_at_or_before_picks_prior_point() {
        let s: MonthlySeries = [(d(2024, 1, 31), 10.0), (d(2024, 2, 29), 11.0)]
            .into_iter()
            .collect();
        assert_eq!(s.latest_at_or_before(d(2024, 1, 30)), None);
        assert_eq!(s.latest_at_or_before(d(2024, 1, 31)), Some(10.0));
        assert_eq!(s.latest_at_or_before(d(2024, 3, 1)), Some(11.0));
        assert_eq!(s.first_date(), Some(d(2024, 1, 31)));
    }

    #[test]
    fn request_window_is_inclusive() {
        let r = SeriesRequest::new("4390", SeriesKind::DailyRate, d(2024, 1, 1), d(2024, 1, 31));
        assert!(r.contains(d(2024, 1, 1)));
        assert!(r.contains(d(2024, 1, 31)));
        assert!(!r.contains(d(2024, 2, 1)));
        assert!(r.kind.is_rate());
    }
}
