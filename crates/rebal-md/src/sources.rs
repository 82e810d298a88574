//! Ticker → series routing.
//!
//! Built-in rules:
//! - `SELIC`, `FDI`, `FRFH`, `LC`, `CDB` track the daily Selic rate (SGS 4390)
//! - `IPCA`, `CDBI` track monthly IPCA (SGS 433)
//! - `PRE` grows at 9 % a year, `PGBL` at 7 % a year
//! - other `BR` tickers are listed as `<ticker>.SA`
//! - other `US` tickers are listed as `<ticker>` and converted with the FX series
//! - anything else has no series and keeps its initial price
//!
//! Per-ticker overrides take precedence over every rule.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const SELIC_DAILY_CODE: &str = "4390";
pub const IPCA_MONTHLY_CODE: &str = "433";
pub const PRE_ANNUAL_RATE: f64 = 0.09;
pub const PGBL_ANNUAL_RATE: f64 = 0.07;

const SELIC_TRACKERS: [&str; 5] = ["SELIC", "FDI", "FRFH", "LC", "CDB"];
const IPCA_TRACKERS: [&str; 2] = ["IPCA", "CDBI"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    /// Quoted in the portfolio's currency.
    #[default]
    Local,
    /// Quoted in USD; multiplied by the FX series.
    Usd,
}

/// Where a ticker's monthly price comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeriesSource {
    /// Percent per day rate series, compounded.
    DailyRate { code: String },
    /// Percent per month rate series, compounded.
    MonthlyRate { code: String },
    /// Constant annual growth rate, computed locally.
    FixedAnnual { rate: f64 },
    /// Listed instrument.
    Market {
        symbol: String,
        #[serde(default)]
        currency: Currency,
    },
    /// No series; the price is never refreshed.
    Untracked,
}

impl SeriesSource {
    pub fn is_tracked(&self) -> bool {
        !matches!(self, SeriesSource::Untracked)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesMap {
    /// Suffix appended to `BR` tickers.
    pub br_suffix: String,
    pub overrides: BTreeMap<String, SeriesSource>,
}

impl Default for SeriesMap {
    fn default() -> Self {
        Self {
            br_suffix: ".SA".to_string(),
            overrides: BTreeMap::new(),
        }
    }
}

impl SeriesMap {
    pub fn with_override(mut self, ticker: impl Into<String>, source: SeriesSource) -> Self {
        self.overrides.insert(ticker.into(), source);
        self
    }

    pub fn resolve(&self, ticker: &str, geography: &str) -> SeriesSource {
        if let Some(s) = self.overrides.get(ticker) {
            return s.clone();
        }
        if SELIC_TRACKERS.contains(&ticker) {
            return SeriesSource::DailyRate {
                code: SELIC_DAILY_CODE.to_string(),
            };
        }
        if IPCA_TRACKERS.contains(&ticker) {
            return SeriesSource::MonthlyRate {
                code: IPCA_MONTHLY_CODE.to_string(),
            };
        }
        match ticker {
            "PRE" => return SeriesSource::FixedAnnual { rate: PRE_ANNUAL_RATE },
            "PGBL" => return SeriesSource::FixedAnnual { rate: PGBL_ANNUAL_RATE },
            _ => {}
        }
        match geography {
            "BR" => SeriesSource::Market {
                symbol: format!("{ticker}{}", self.br_suffix),
                currency: Currency::Local,
            },
            "US" => SeriesSource::Market {
                symbol: ticker.to_string(),
                currency: Currency::Usd,
            },
            _ => SeriesSource::Untracked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_routing() {
        let m = SeriesMap::default();
        assert_eq!(
            m.resolve("CDB", "BR"),
            SeriesSource::DailyRate {
                code: "4390".into()
            }
        );
        assert_eq!(
            m.resolve("CDBI", "BR"),
            SeriesSource::MonthlyRate { code: "433".into() }
        );
        assert_eq!(m.resolve("PGBL", "BR"), SeriesSource::FixedAnnual { rate: 0.07 });
        assert_eq!(
            m.resolve("BOVA11", "BR"),
            SeriesSource::Market {
                symbol: "BOVA11.SA".into(),
                currency: Currency::Local
            }
        );
        assert_eq!(
            m.resolve("VOO", "US"),
            SeriesSource::Market {
                symbol: "VOO".into(),
                currency: Currency::Usd
            }
        );
        assert!(!m.resolve("BTC", "CRYPTO").is_tracked());
    }

    #[test]
    fn override_wins_over_builtin_rule() {
        let m = SeriesMap::default().with_override(
            "SELIC",
            SeriesSource::FixedAnnual { rate: 0.1 },
        );
        assert_eq!(m.resolve("SELIC", "BR"), SeriesSource::FixedAnnual { rate: 0.1 });
    }

    #[test]
    fn source_deserializes_from_tagged_yaml_like_json() {
        let s: SeriesSource =
            serde_json::from_str(r#"{"type":"market","symbol":"IVV"}"#).unwrap();
        assert_eq!(
            s,
            SeriesSource::Market {
                symbol: "IVV".into(),
                currency: Currency::Local
            }
        );
    }
}
