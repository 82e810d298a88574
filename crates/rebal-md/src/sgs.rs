//! Banco Central do Brasil SGS provider (rate series only).
//!
//! `GET {base}/dados/serie/bcdata.sgs.{code}/dados?formato=json&dataInicial=dd/mm/yyyy&dataFinal=dd/mm/yyyy`
//! returns `[{"data": "02/01/2024", "valor": "0.043739"}, ...]`. Values come
//! as strings and may use a decimal comma.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::provider::{ProviderError, SeriesProvider};
use crate::{Observation, SeriesRequest};

pub const SGS_BASE_URL: &str = "https://api.bcb.gov.br";

const SGS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
struct SgsPoint {
    data: String,
    valor: String,
}

#[derive(Debug, Clone)]
pub struct SgsProvider {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl SgsProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(SGS_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(SGS_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Config(format!("sgs http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn series_url(&self, code: &str) -> String {
        format!(
            "{}/dados/serie/bcdata.sgs.{}/dados",
            self.base_url.trim_end_matches('/'),
            code
        )
    }
}

impl SeriesProvider for SgsProvider {
    fn name(&self) -> &'static str {
        "sgs"
    }

    fn fetch(&self, req: &SeriesRequest) -> Result<Vec<Observation>, ProviderError> {
        if !req.kind.is_rate() {
            return Err(ProviderError::Config(format!(
                "sgs serves rate series only; got {} request for {}",
                req.kind.as_str(),
                req.id
            )));
        }

        let start_s = req.start.format("%d/%m/%Y").to_string();
        let end_s = req.end.format("%d/%m/%Y").to_string();

        let resp = self
            .http
            .get(self.series_url(&req.id))
            .query(&[
                ("formato", "json"),
                ("dataInicial", start_s.as_str()),
                ("dataFinal", end_s.as_str()),
            ])
            .send()
            .map_err(|e| ProviderError::Transport(format!("sgs request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().unwrap_or_default();
            return Err(ProviderError::Api {
                code: Some(i64::from(status.as_u16())),
                message,
            });
        }

        let points: Vec<SgsPoint> = resp
            .json()
            .map_err(|e| ProviderError::Decode(format!("sgs response json decode failed: {e}")))?;

        points.iter().map(parse_point).collect()
    }
}

fn parse_point(p: &SgsPoint) -> Result<Observation, ProviderError> {
    let date = NaiveDate::parse_from_str(p.data.trim(), "%d/%m/%Y")
        .map_err(|e| ProviderError::Decode(format!("sgs date '{}': {e}", p.data)))?;
    let value = parse_decimal(&p.valor)
        .ok_or_else(|| ProviderError::Decode(format!("sgs value '{}'", p.valor)))?;
    Ok(Observation::new(date, value))
}

/// Accepts `0.043739` and `0,043739`.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.replace(',', ".").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_comma_and_dot() {
        assert_eq!(parse_decimal("0,5"), Some(0.5));
        assert_eq!(parse_decimal(" 0.043739 "), Some(0.043739));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("n/a"), None);
    }

    #[test]
    fn point_parses_brazilian_date() {
        let p = SgsPoint {
            data: "02/01/2024".to_string(),
            valor: "0,042".to_string(),
        };
        let o = parse_point(&p).unwrap();
        assert_eq!(o.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!((o.value - 0.042).abs() < 1e-15);
    }

    #[test]
    fn url_trims_trailing_slash() {
        let p = SgsProvider::with_base_url("http://localhost:1/").unwrap();
        assert_eq!(
            p.series_url("433"),
            "http://localhost:1/dados/serie/bcdata.sgs.433/dados"
        );
    }
}
