use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rebal_md::{RetryPolicy, SeriesMap};

/// Typed view of the merged config tree.
///
/// ```yaml
/// contribution:
///   amount: 2500
///   min_selected: 3        # optional cardinality floor for the MILP allocator
/// portfolio:
///   positions: positions.csv
/// backtest:
///   months: 24
///   end_date: 2025-05-01   # optional, defaults to today
/// market:
///   rates: sgs             # or csv
///   prices: csv            # or chart (set fx_symbol: USDBRL=X)
///   data_dir: data
/// output:
///   dir: runs
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalConfig {
    pub contribution: ContributionSection,
    pub portfolio: PortfolioSection,
    pub backtest: BacktestSection,
    pub market: MarketSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContributionSection {
    pub amount: f64,
    pub min_selected: Option<usize>,
}

impl Default for ContributionSection {
    fn default() -> Self {
        Self {
            amount: 2500.0,
            min_selected: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioSection {
    /// Positions CSV, relative to the working directory.
    pub positions: String,
    pub delimiter: char,
    /// Rows of this class are bought in continuous amounts...
    pub fixed_income_class: String,
    /// ...except these tickers, which trade in whole units.
    pub whole_unit_tickers: Vec<String>,
    /// Holding that absorbs each month's leftover in the backtest.
    pub liquidity_ticker: String,
}

impl Default for PortfolioSection {
    fn default() -> Self {
        Self {
            positions: "positions.csv".to_string(),
            delimiter: ';',
            fixed_income_class: "RF".to_string(),
            whole_unit_tickers: vec!["IMAB11".to_string()],
            liquidity_ticker: "SELIC".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub months: usize,
    pub end_date: Option<NaiveDate>,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            months: 24,
            end_date: None,
        }
    }
}

impl BacktestSection {
    /// Configured end date, or `today` when none is set.
    pub fn end_date_or(&self, today: NaiveDate) -> NaiveDate {
        self.end_date.unwrap_or(today)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatesProvider {
    /// Central bank SGS web service.
    #[default]
    Sgs,
    /// `<code>.csv` files in the data directory.
    Csv,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricesProvider {
    /// `<symbol>.csv` files in the data directory.
    #[default]
    Csv,
    /// Daily closes over the chart HTTP endpoint.
    Chart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSection {
    pub rates: RatesProvider,
    pub prices: PricesProvider,
    /// Directory of `<symbol>.csv` price files (and rate files for `rates: csv`).
    pub data_dir: String,
    pub sgs_base_url: Option<String>,
    pub chart_base_url: Option<String>,
    pub fx_symbol: String,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub series: SeriesMap,
}

impl Default for MarketSection {
    fn default() -> Self {
        Self {
            rates: RatesProvider::Sgs,
            prices: PricesProvider::Csv,
            data_dir: "data".to_string(),
            sgs_base_url: None,
            chart_base_url: None,
            fx_symbol: "USDBRL".to_string(),
            retry_attempts: 3,
            retry_backoff_ms: 1000,
            series: SeriesMap::default(),
        }
    }
}

impl MarketSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Run directories are created under this path.
    pub dir: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: "runs".to_string(),
        }
    }
}

impl RebalConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: RebalConfig =
            serde_json::from_value(v.clone()).context("config does not match the expected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let amount = self.contribution.amount;
        if !amount.is_finite() || amount < 0.0 {
            bail!("contribution.amount must be a finite non-negative number, got {amount}");
        }
        if self.backtest.months == 0 {
            bail!("backtest.months must be at least 1");
        }
        if !self.portfolio.delimiter.is_ascii() {
            bail!(
                "portfolio.delimiter must be a single ASCII character, got {:?}",
                self.portfolio.delimiter
            );
        }
        if self.market.retry_attempts == 0 {
            bail!("market.retry_attempts must be at least 1");
        }
        if self.portfolio.liquidity_ticker.trim().is_empty() {
            bail!("portfolio.liquidity_ticker must not be empty");
        }
        Ok(())
    }
}
