use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use rebal_backtest::{ContributionLedgerEntry, SimulationReport};

/// One row per month.
///
/// Columns: `month, date, invested`, then for each lane `value_<s>`,
/// `return_pct_<s>`, `deficit_<s>`, `leftover_<s>`, `fell_back_<s>`, then
/// `drift_<class>_<s>` (percentage points) for every class and lane.
pub fn write_backtest_results_csv(path: &Path, report: &SimulationReport) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("create backtest results csv failed: {}", path.display()))?;

    let Some(first) = report.snapshots.first() else {
        wtr.write_record(["month", "date", "invested"])
            .context("write backtest results header failed")?;
        wtr.flush().context("flush backtest results csv failed")?;
        return Ok(());
    };
    let lanes: Vec<&str> = first.lanes.iter().map(|l| l.strategy.as_str()).collect();

    let mut header: Vec<String> = vec!["month".into(), "date".into(), "invested".into()];
    for s in &lanes {
        header.push(format!("value_{s}"));
        header.push(format!("return_pct_{s}"));
        header.push(format!("deficit_{s}"));
        header.push(format!("leftover_{s}"));
        header.push(format!("fell_back_{s}"));
    }
    for class in &report.classes {
        for s in &lanes {
            header.push(format!("drift_{class}_{s}"));
        }
    }
    wtr.write_record(&header)
        .context("write backtest results header failed")?;

    for snap in &report.snapshots {
        let mut row: Vec<String> = vec![
            snap.month.to_string(),
            snap.date.to_string(),
            snap.invested.to_string(),
        ];
        for lane in &snap.lanes {
            row.push(lane.value.to_string());
            row.push((lane.corrected_return * 100.0).to_string());
            row.push(lane.deficit.to_string());
            row.push(lane.leftover.to_string());
            row.push(lane.fell_back.to_string());
        }
        for class in &report.classes {
            for lane in &snap.lanes {
                let drift = lane.drift_pp.get(class).copied().unwrap_or(0.0);
                row.push(drift.to_string());
            }
        }
        wtr.write_record(&row)
            .with_context(|| format!("write backtest row for month {} failed", snap.month))?;
    }
    wtr.flush().context("flush backtest results csv failed")?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    month: usize,
    date: String,
    lane: &'a str,
    strategy: &'a str,
    kind: &'a str,
    geography: &'a str,
    asset_class: &'a str,
    subclass: &'a str,
    asset: &'a str,
    ticker: &'a str,
    quantity_held: f64,
    price: f64,
    value: f64,
    pre_weight_pct: f64,
    target_weight_pct: f64,
    deviation_pct: f64,
    quantity: f64,
    amount: f64,
}

impl<'a> From<&'a ContributionLedgerEntry> for HistoryRow<'a> {
    fn from(e: &'a ContributionLedgerEntry) -> Self {
        Self {
            month: e.month,
            date: e.date.to_string(),
            lane: e.lane.as_str(),
            strategy: e.strategy.as_str(),
            kind: e.kind.as_str(),
            geography: &e.key.geography,
            asset_class: &e.key.asset_class,
            subclass: &e.key.subclass,
            asset: &e.key.asset,
            ticker: &e.key.ticker,
            quantity_held: e.quantity_held,
            price: e.price,
            value: e.value,
            pre_weight_pct: e.pre_weight * 100.0,
            target_weight_pct: e.target_weight * 100.0,
            deviation_pct: e.deviation * 100.0,
            quantity: e.quantity,
            amount: e.amount,
        }
    }
}

/// The contribution ledger, one row per purchase or sweep, weights in percent.
pub fn write_allocation_history_csv(path: &Path, report: &SimulationReport) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("create allocation history csv failed: {}", path.display()))?;
    for e in &report.ledger {
        wtr.serialize(HistoryRow::from(e))
            .with_context(|| format!("write history row for month {} failed", e.month))?;
    }
    wtr.flush().context("flush allocation history csv failed")?;
    Ok(())
}
