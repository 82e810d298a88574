//! CSV directory provider.
//!
//! One file per series, named `<id>.csv` (`BOVA11.SA.csv`, `USDBRL.csv`,
//! `4390.csv`), with a `date,value` header:
//!
//! | Column  | Type / example | Notes                                   |
//! |---------|----------------|-----------------------------------------|
//! | `date`  | `2024-01-31`   | ISO date                                |
//! | `value` | `128.41`       | Price, or percent rate for rate series  |
//!
//! Rows outside the request window are dropped.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::provider::{ProviderError, SeriesProvider};
use crate::{Observation, SeriesRequest};

#[derive(Debug, Deserialize)]
struct SeriesRow {
    date: NaiveDate,
    value: f64,
}

/// Reads series from a directory of CSV files.
#[derive(Debug, Clone)]
pub struct CsvSeriesProvider {
    dir: PathBuf,
}

impl CsvSeriesProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.csv"))
    }
}

impl SeriesProvider for CsvSeriesProvider {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn fetch(&self, req: &SeriesRequest) -> Result<Vec<Observation>, ProviderError> {
        let path = self.path_for(&req.id);
        if !path.exists() {
            return Err(ProviderError::NotFound {
                series: req.id.clone(),
            });
        }
        let rdr = csv::Reader::from_path(&path)
            .map_err(|e| ProviderError::Transport(format!("open '{}': {e}", path.display())))?;
        read_rows(rdr, req)
    }
}

/// Parse `date,value` CSV text and keep the rows inside the request window.
pub fn parse_series_csv_str(src: &str, req: &SeriesRequest) -> Result<Vec<Observation>, ProviderError> {
    read_rows(csv::Reader::from_reader(src.as_bytes()), req)
}

fn read_rows<R: std::io::Read>(
    mut rdr: csv::Reader<R>,
    req: &SeriesRequest,
) -> Result<Vec<Observation>, ProviderError> {
    let mut out = Vec::new();
    for (i, rec) in rdr.deserialize::<SeriesRow>().enumerate() {
        let row = rec.map_err(|e| ProviderError::Decode(format!("{} row {}: {e}", req.id, i + 1)))?;
        if req.contains(row.date) {
            out.push(Observation::new(row.date, row.value));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SeriesKind;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn req(id: &str) -> SeriesRequest {
        SeriesRequest::new(id, SeriesKind::Price, d(2024, 1, 1), d(2024, 2, 29))
    }

    #[test]
    fn parses_and_filters_window() {
        let src = "date,value\n2023-12-29,9.5\n2024-01-31,10.0\n2024-02-29,10.5\n2024-03-28,11.0\n";
        let obs = parse_series_csv_str(src, &req("X")).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0], Observation::new(d(2024, 1, 31), 10.0));
    }

    #[test]
    fn bad_value_is_decode_error() {
        let src = "date,value\n2024-01-31,abc\n";
        let err = parse_series_csv_str(src, &req("X")).unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let p = CsvSeriesProvider::new(dir.path());
        let err = p.fetch(&req("NOPE.SA")).unwrap_err();
        assert_eq!(
            err,
            ProviderError::NotFound {
                series: "NOPE.SA".to_string()
            }
        );
    }

    #[test]
    fn reads_file_named_after_series_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("BOVA11.SA.csv"),
            "date,value\n2024-01-31,120.0\n",
        )
        .unwrap();
        let p = CsvSeriesProvider::new(dir.path());
        let obs = p.fetch(&req("BOVA11.SA")).unwrap();
        assert_eq!(obs, vec![Observation::new(d(2024, 1, 31), 120.0)]);
    }
}
