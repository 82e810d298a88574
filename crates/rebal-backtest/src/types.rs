use std::collections::BTreeMap;

use chrono::NaiveDate;
use rebal_portfolio::{HoldingKey, Portfolio, Strategy};

/// Simulation configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Fixed contribution added every month.
    pub contribution: f64,

    /// Number of monthly steps.
    pub months: usize,

    /// The last step is the first day of this date's month.
    pub end_date: NaiveDate,

    /// Cardinality floor for the optimizing lane (`None` = no constraint).
    pub min_selected: Option<usize>,

    /// Holding that receives unspent leftover cash.
    pub liquidity_ticker: String,
}

impl SimulationConfig {
    /// Reasonable defaults for testing.
    pub fn test_defaults(end_date: NaiveDate) -> Self {
        Self {
            contribution: 2500.0,
            months: 24,
            end_date,
            min_selected: None,
            liquidity_ticker: "SELIC".to_string(),
        }
    }
}

/// What a ledger row records.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LedgerKind {
    Purchase,
    /// Leftover cash booked into the liquidity holding.
    Sweep,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Purchase => "purchase",
            LedgerKind::Sweep => "sweep",
        }
    }
}

/// One executed purchase or leftover sweep. Never mutated once recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct ContributionLedgerEntry {
    pub month: usize,
    pub date: NaiveDate,
    /// Portfolio copy the entry belongs to.
    pub lane: Strategy,
    /// Allocator that produced the purchase (differs from `lane` on fallback).
    pub strategy: Strategy,
    pub kind: LedgerKind,
    pub key: HoldingKey,
    /// Quantity held before the purchase.
    pub quantity_held: f64,
    pub price: f64,
    /// Holding value before the purchase.
    pub value: f64,
    /// Holding value ÷ portfolio value, before the purchase (fraction).
    pub pre_weight: f64,
    pub target_weight: f64,
    /// `pre_weight − target_weight` (fraction).
    pub deviation: f64,
    pub quantity: f64,
    pub amount: f64,
}

/// One lane's state at the end of a month.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneSnapshot {
    pub strategy: Strategy,
    pub value: f64,
    /// Σ max(0, target_weight × value − holding value), per row.
    pub deficit: f64,
    /// value / invested − 1 (fraction).
    pub corrected_return: f64,
    /// Per asset class: actual weight − target weight, in percentage points.
    pub drift_pp: BTreeMap<String, f64>,
    /// The optimizing allocator failed this month and the waterfall was used.
    pub fell_back: bool,
    /// This month's leftover.
    pub leftover: f64,
    /// Leftover that could not be swept (no liquidity holding), cumulative.
    pub idle_cash: f64,
}

/// One record per simulated month.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationSnapshot {
    pub month: usize,
    pub date: NaiveDate,
    /// Initial value + month × contribution.
    pub invested: f64,
    pub lanes: Vec<LaneSnapshot>,
}

impl SimulationSnapshot {
    pub fn lane(&self, strategy: Strategy) -> Option<&LaneSnapshot> {
        self.lanes.iter().find(|l| l.strategy == strategy)
    }
}

/// Simulation report produced after a run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationReport {
    pub initial_value: f64,
    pub snapshots: Vec<SimulationSnapshot>,
    pub ledger: Vec<ContributionLedgerEntry>,
    /// Final portfolio per lane.
    pub portfolios: Vec<(Strategy, Portfolio)>,
    /// Asset classes reported in the drift maps, sorted.
    pub classes: Vec<String>,
}

impl SimulationReport {
    pub fn last(&self) -> Option<&SimulationSnapshot> {
        self.snapshots.last()
    }

    pub fn portfolio(&self, strategy: Strategy) -> Option<&Portfolio> {
        self.portfolios
            .iter()
            .find(|(s, _)| *s == strategy)
            .map(|(_, p)| p)
    }

    /// Months in which the optimizing lane fell back to the waterfall.
    pub fn fallback_months(&self) -> Vec<usize> {
        self.snapshots
            .iter()
            .filter(|s| s.lanes.iter().any(|l| l.fell_back))
            .map(|s| s.month)
            .collect()
    }
}
