//! Position CSV loader.
//!
//! CSV format (delimiter configurable, `;` by default)
//!
//! Required columns:
//! - `geography`
//! - `asset_class`
//! - `subclass`
//! - `asset`
//! - `ticker`
//! - `quantity`
//! - `price`
//! - `target_weight` (fraction, or percent when any weight exceeds 1)
//!
//! Optional columns:
//! - `value` (default: `quantity × price`)
//!
//! Spreadsheet exports with the headers `Geo.;Classe;Subclasses;Ativo;Ticker;
//! Qnt.;Cotação;Total;% Ideal - Ref.` load as well.
//!
//! Numbers accept either `.` or `,` as the decimal separator.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use rebal_portfolio::{Holding, HoldingKey, Portfolio, PurchaseUnit};

/// Loader errors are small, explicit, and test-friendly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    EmptyInput,
    MissingColumn(&'static str),
    InvalidNumber {
        line: usize,
        column: &'static str,
        value: String,
    },
    Csv(String),
    Io(String),
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e.to_string())
    }
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        LoadError::Csv(e.to_string())
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::EmptyInput => write!(f, "empty input"),
            LoadError::MissingColumn(c) => write!(f, "missing column: {c}"),
            LoadError::InvalidNumber {
                line,
                column,
                value,
            } => write!(f, "line {line}: cannot parse {column} from '{value}'"),
            LoadError::Csv(e) => write!(f, "csv error: {e}"),
            LoadError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Required columns with the spreadsheet-export header accepted for each.
const REQUIRED: [(&str, &str); 8] = [
    ("geography", "Geo."),
    ("asset_class", "Classe"),
    ("subclass", "Subclasses"),
    ("asset", "Ativo"),
    ("ticker", "Ticker"),
    ("quantity", "Qnt."),
    ("price", "Cotação"),
    ("target_weight", "% Ideal - Ref."),
];

/// Which rows are bought in continuous amounts.
///
/// Rows of the fixed-income class are continuous, except the listed tickers
/// (exchange-traded fixed-income funds) which trade in whole units. Every
/// other class trades in whole units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasePolicy {
    pub fixed_income_class: String,
    pub whole_unit_tickers: Vec<String>,
}

impl Default for PurchasePolicy {
    fn default() -> Self {
        Self {
            fixed_income_class: "RF".to_string(),
            whole_unit_tickers: vec!["IMAB11".to_string()],
        }
    }
}

impl PurchasePolicy {
    pub fn classify(&self, asset_class: &str, ticker: &str) -> PurchaseUnit {
        if asset_class == self.fixed_income_class
            && !self.whole_unit_tickers.iter().any(|t| t == ticker)
        {
            PurchaseUnit::Continuous
        } else {
            PurchaseUnit::Whole
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub delimiter: u8,
    pub policy: PurchasePolicy,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            policy: PurchasePolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PositionRow {
    #[serde(alias = "Geo.")]
    geography: String,
    #[serde(alias = "Classe")]
    asset_class: String,
    #[serde(alias = "Subclasses")]
    subclass: String,
    #[serde(alias = "Ativo")]
    asset: String,
    #[serde(alias = "Ticker")]
    ticker: String,
    #[serde(alias = "Qnt.")]
    quantity: String,
    #[serde(alias = "Cotação")]
    price: String,
    #[serde(default, alias = "Total")]
    value: Option<String>,
    #[serde(alias = "% Ideal - Ref.")]
    target_weight: String,
}

/// Load a portfolio from a CSV file on disk.
pub fn load_positions_file(
    path: impl AsRef<Path>,
    opts: &LoaderOptions,
) -> Result<Portfolio, LoadError> {
    let s = fs::read_to_string(path)?;
    parse_positions(&s, opts)
}

/// Parse a portfolio from CSV content (pure, deterministic).
pub fn parse_positions(src: &str, opts: &LoaderOptions) -> Result<Portfolio, LoadError> {
    let src = src.trim_start_matches('\u{feff}');
    if src.trim().is_empty() {
        return Err(LoadError::EmptyInput);
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .trim(csv::Trim::All)
        .from_reader(src.as_bytes());

    let headers: HashSet<String> = rdr.headers()?.iter().map(str::to_string).collect();
    for (col, alias) in REQUIRED {
        if !headers.contains(col) && !headers.contains(alias) {
            return Err(LoadError::MissingColumn(col));
        }
    }

    let mut holdings = Vec::new();
    for (i, rec) in rdr.deserialize::<PositionRow>().enumerate() {
        let line = i + 2;
        let row = rec?;
        let quantity = number(&row.quantity, line, "quantity")?;
        let price = number(&row.price, line, "price")?;
        let target_weight = number(&row.target_weight, line, "target_weight")?;
        let unit = opts.policy.classify(&row.asset_class, &row.ticker);

        let mut h = Holding::new(
            HoldingKey::new(row.geography, row.asset_class, row.subclass, row.asset, row.ticker),
            quantity,
            price,
            target_weight,
            unit,
        );
        if let Some(v) = row.value.as_deref().filter(|v| !v.is_empty()) {
            h.value = number(v, line, "value")?;
        }
        holdings.push(h);
    }

    if holdings.is_empty() {
        return Err(LoadError::EmptyInput);
    }

    let mut portfolio = Portfolio::new(holdings);
    normalize_target_weights(&mut portfolio);
    Ok(portfolio)
}

/// Weights written as percentages (any weight > 1) are divided by 100.
pub fn normalize_target_weights(portfolio: &mut Portfolio) {
    let max = portfolio
        .holdings
        .iter()
        .map(|h| h.target_weight)
        .fold(f64::NEG_INFINITY, f64::max);
    if max > 1.0 {
        for h in &mut portfolio.holdings {
            h.target_weight /= 100.0;
        }
    }
}

fn number(raw: &str, line: usize, column: &'static str) -> Result<f64, LoadError> {
    let s = raw.trim().replace(',', ".");
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| LoadError::InvalidNumber {
            line,
            column,
            value: raw.to_string(),
        })
}
