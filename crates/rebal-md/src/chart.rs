//! Daily price provider over a Yahoo-style chart endpoint (price series only).
//!
//! `GET {base}/v8/finance/chart/{symbol}?period1=<unix>&period2=<unix>&interval=1d`
//! returns
//!
//! ```json
//! {"chart": {"result": [{"timestamp": [1704204000, ...],
//!   "indicators": {"quote": [{"close": [130.1, ...]}],
//!                  "adjclose": [{"adjclose": [129.7, ...]}]}}],
//!  "error": null}}
//! ```
//!
//! Adjusted closes are preferred; plain closes are used when the adjusted
//! block is absent. Null points are dropped.

use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::provider::{ProviderError, SeriesProvider};
use crate::{Observation, SeriesRequest};

pub const CHART_BASE_URL: &str = "https://query1.finance.yahoo.com";

const CHART_TIMEOUT: Duration = Duration::from_secs(15);
const CHART_USER_AGENT: &str = "rebal/0.0.1";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    #[serde(default)]
    adjclose: Vec<AdjCloseBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct ChartProvider {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl ChartProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(CHART_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(CHART_TIMEOUT)
            .user_agent(CHART_USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Config(format!("chart http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            symbol
        )
    }
}

impl SeriesProvider for ChartProvider {
    fn name(&self) -> &'static str {
        "chart"
    }

    fn fetch(&self, req: &SeriesRequest) -> Result<Vec<Observation>, ProviderError> {
        if req.kind.is_rate() {
            return Err(ProviderError::Config(format!(
                "chart serves price series only; got {} request for {}",
                req.kind.as_str(),
                req.id
            )));
        }

        // period2 is exclusive upstream; the request window is inclusive.
        let period1 = unix_midnight(req.start).to_string();
        let period2 = unix_midnight(req.end.succ_opt().unwrap_or(req.end)).to_string();

        let resp = self
            .http
            .get(self.chart_url(&req.id))
            .query(&[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", "1d"),
                ("events", "div,splits"),
            ])
            .send()
            .map_err(|e| ProviderError::Transport(format!("chart request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| ProviderError::Transport(format!("chart response read failed: {e}")))?;

        // Error payloads keep the envelope shape, so decode before the status check.
        let envelope: Option<ChartEnvelope> = serde_json::from_str(&body).ok();
        if let Some(err) = envelope.as_ref().and_then(|e| e.chart.error.as_ref()) {
            if err.code.eq_ignore_ascii_case("not found") {
                return Err(ProviderError::NotFound {
                    series: req.id.clone(),
                });
            }
            return Err(ProviderError::Api {
                code: Some(i64::from(status.as_u16())),
                message: format!("{}: {}", err.code, err.description),
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Api {
                code: Some(i64::from(status.as_u16())),
                message: body,
            });
        }

        let envelope = envelope.ok_or_else(|| {
            ProviderError::Decode(format!("chart response json decode failed for {}", req.id))
        })?;
        let result = envelope
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ProviderError::Empty {
                series: req.id.clone(),
            })?;

        observations(result)
    }
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

fn observations(result: ChartResult) -> Result<Vec<Observation>, ProviderError> {
    let closes: Vec<Option<f64>> = match result.indicators.adjclose.into_iter().next() {
        Some(block) if !block.adjclose.is_empty() => block.adjclose,
        _ => result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default(),
    };
    if closes.len() != result.timestamp.len() {
        return Err(ProviderError::Decode(format!(
            "chart has {} timestamps but {} closes",
            result.timestamp.len(),
            closes.len()
        )));
    }

    let mut out = Vec::with_capacity(closes.len());
    for (ts, close) in result.timestamp.iter().zip(closes) {
        let Some(value) = close.filter(|v| v.is_finite()) else {
            continue;
        };
        let date = DateTime::from_timestamp(*ts, 0)
            .ok_or_else(|| ProviderError::Decode(format!("chart timestamp {ts}")))?
            .date_naive();
        out.push(Observation::new(date, value));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn plain_close_is_used_without_adjusted_block() {
        let raw = r#"{"timestamp": [1704196800, 1704283200],
                      "indicators": {"quote": [{"close": [10.5, null]}]}}"#;
        let result: ChartResult = serde_json::from_str(raw).unwrap();
        let obs = observations(result).unwrap();
        assert_eq!(obs, vec![Observation::new(d(2024, 1, 2), 10.5)]);
    }

    #[test]
    fn length_mismatch_is_a_decode_error() {
        let raw = r#"{"timestamp": [1704196800],
                      "indicators": {"quote": [{"close": []}], "adjclose": [{"adjclose": [1.0, 2.0]}]}}"#;
        let result: ChartResult = serde_json::from_str(raw).unwrap();
        assert!(matches!(observations(result), Err(ProviderError::Decode(_))));
    }

    #[test]
    fn window_bounds_are_utc_midnights() {
        assert_eq!(unix_midnight(d(2024, 1, 1)), 1_704_067_200);
        let p = ChartProvider::with_base_url("http://localhost:1/").unwrap();
        assert_eq!(p.chart_url("BOVA11.SA"), "http://localhost:1/v8/finance/chart/BOVA11.SA");
    }
}
