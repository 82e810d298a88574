use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use rebal_portfolio::{AllocationPlan, PlanLine, Strategy};

/// `allocation_<strategy>.csv`
pub fn allocation_file_name(strategy: Strategy) -> String {
    format!("allocation_{}.csv", strategy.as_str())
}

#[derive(Debug, Serialize)]
struct AllocationRow<'a> {
    geography: &'a str,
    asset_class: &'a str,
    subclass: &'a str,
    asset: &'a str,
    ticker: &'a str,
    unit: &'a str,
    price: f64,
    target_weight_pct: f64,
    deficit: f64,
    quantity: f64,
    cost: f64,
    residual_deficit: f64,
}

impl<'a> From<&'a PlanLine> for AllocationRow<'a> {
    fn from(l: &'a PlanLine) -> Self {
        Self {
            geography: &l.key.geography,
            asset_class: &l.key.asset_class,
            subclass: &l.key.subclass,
            asset: &l.key.asset,
            ticker: &l.key.ticker,
            unit: l.unit.as_str(),
            price: l.price,
            target_weight_pct: l.target_weight * 100.0,
            deficit: l.deficit,
            quantity: l.quantity,
            cost: l.cost,
            residual_deficit: l.residual_deficit,
        }
    }
}

/// Write the purchases of `plan`, largest cost first.
pub fn write_allocation_csv(path: &Path, plan: &AllocationPlan) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("create allocation csv failed: {}", path.display()))?;
    for line in plan.purchases_by_cost() {
        wtr.serialize(AllocationRow::from(line))
            .with_context(|| format!("write allocation row failed: {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("flush allocation csv failed: {}", path.display()))?;
    Ok(())
}

/// Human-readable single-shot result: purchases by cost, then the budget
/// summary. `liquidity_ticker` names where a positive leftover goes.
pub fn render_plan(plan: &AllocationPlan, liquidity_ticker: &str) -> String {
    let mut out = String::new();
    let rule = "=".repeat(72);
    let title = match plan.strategy {
        Strategy::Waterfall => "RESULT - WATERFALL",
        Strategy::Milp => "RESULT - MILP",
    };

    let _ = writeln!(out, "\n{title}");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "{:<4} {:<6} {:<14} {:<18} {:<8} {:>10} {:>10} {:>12}",
        "geo", "class", "subclass", "asset", "ticker", "price", "qty", "cost"
    );
    for l in plan.purchases_by_cost() {
        let _ = writeln!(
            out,
            "{:<4} {:<6} {:<14} {:<18} {:<8} {:>10.2} {:>10} {:>12.2}",
            l.key.geography,
            l.key.asset_class,
            truncate(&l.key.subclass, 14),
            truncate(&l.key.asset, 18),
            l.key.ticker,
            l.price,
            quantity(l),
            l.cost
        );
    }

    let total = plan.total_cost();
    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Budget:        {:>14.2}", plan.contribution);
    let _ = writeln!(out, "Total cost:    {:>14.2}", total);
    let _ = writeln!(out, "Leftover:      {:>14.2}", plan.leftover);
    let _ = writeln!(out, "Utilization:   {:>13.1}%", plan.utilization() * 100.0);
    if plan.leftover > 0.0 {
        let _ = writeln!(
            out,
            "\nLeftover of {:.2} goes to {liquidity_ticker}",
            plan.leftover
        );
    }
    out
}

fn quantity(l: &PlanLine) -> String {
    if l.unit.is_continuous() {
        format!("{:.2}", l.quantity)
    } else {
        format!("{}", l.quantity as i64)
    }
}

fn truncate(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}
