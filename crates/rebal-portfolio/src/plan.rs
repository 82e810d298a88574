use std::fmt;

use crate::aggregate::AggregatedHolding;
use crate::types::{safe_ratio, HoldingKey, Portfolio, PurchaseUnit};

/// Which allocator produced a plan.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    /// Proportional deficit split with leftover redistribution.
    Waterfall,
    /// Mixed-integer program minimising unmet deficit.
    Milp,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Waterfall => "waterfall",
            Strategy::Milp => "milp",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purchase decision for one aggregated holding.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanLine {
    pub key: HoldingKey,
    /// Portfolio row the purchase is booked on.
    pub row: usize,
    pub unit: PurchaseUnit,
    pub price: f64,
    pub target_weight: f64,
    /// Deficit before purchase.
    pub deficit: f64,
    /// Share of the contribution assigned before rounding (waterfall only).
    pub allocated: f64,
    pub quantity: f64,
    /// quantity × price, except continuous lines where it equals `allocated`.
    pub cost: f64,
    /// Deficit still unmet after this line's purchase, floored at 0.
    pub residual_deficit: f64,
}

impl PlanLine {
    pub(crate) fn from_aggregate(h: &AggregatedHolding) -> Self {
        Self {
            key: h.key.clone(),
            row: h.booking_row(),
            unit: h.unit,
            price: h.price,
            target_weight: h.target_weight,
            deficit: h.deficit,
            allocated: 0.0,
            quantity: 0.0,
            cost: 0.0,
            residual_deficit: h.deficit,
        }
    }

    pub fn has_tradable_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }

    pub fn is_purchase(&self) -> bool {
        self.quantity > 0.0
    }
}

/// Output of one allocator invocation for one contribution event.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocationPlan {
    pub strategy: Strategy,
    pub contribution: f64,
    pub lines: Vec<PlanLine>,
    /// contribution − Σ cost, never negative.
    pub leftover: f64,
    /// Outer redistribution passes that bought at least one unit (waterfall only).
    pub redistribution_passes: usize,
}

impl AllocationPlan {
    /// A plan that buys nothing and keeps the whole contribution as leftover.
    pub fn idle(strategy: Strategy, contribution: f64, lines: Vec<PlanLine>) -> Self {
        Self {
            strategy,
            contribution,
            lines,
            leftover: contribution.max(0.0),
            redistribution_passes: 0,
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.lines.iter().map(|l| l.cost).sum()
    }

    /// Recompute `leftover` from the lines.
    pub fn settle(&mut self) {
        self.leftover = (self.contribution - self.total_cost()).max(0.0);
    }

    /// Lines with a positive quantity, in plan order.
    pub fn purchases(&self) -> impl Iterator<Item = &PlanLine> {
        self.lines.iter().filter(|l| l.is_purchase())
    }

    /// Purchases sorted by cost, largest first.
    pub fn purchases_by_cost(&self) -> Vec<&PlanLine> {
        let mut out: Vec<&PlanLine> = self.purchases().collect();
        out.sort_by(|a, b| {
            b.cost
                .partial_cmp(&a.cost)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    pub fn is_empty(&self) -> bool {
        self.purchases().next().is_none()
    }

    /// Σ cost / contribution (0 for a zero contribution).
    pub fn utilization(&self) -> f64 {
        safe_ratio(self.total_cost(), self.contribution)
    }

    /// Σ residual deficit across lines.
    pub fn residual_deficit(&self) -> f64 {
        self.lines.iter().map(|l| l.residual_deficit).sum()
    }

    /// Add purchased quantities to the portfolio rows and revalue it.
    pub fn apply_to(&self, portfolio: &mut Portfolio) {
        for line in self.purchases() {
            if let Some(h) = portfolio.holdings.get_mut(line.row) {
                h.quantity += line.quantity;
            }
        }
        portfolio.revalue();
    }
}
