//! Deficit waterfall allocator.
//!
//! # Algorithm
//!
//! 1. Aggregate rows by identity and compute each deficit against
//!    `target_weight × (portfolio_value + contribution)`.
//! 2. Split the contribution proportionally to deficit. A zero total deficit
//!    yields an idle plan (nothing bought, full leftover).
//! 3. Continuous holdings receive exactly their share (`quantity = share / price`).
//!    Whole-unit holdings receive `floor(share / price)` units; the rounding
//!    loss stays in the leftover.
//! 4. Redistribute: while the leftover covers the cheapest whole-unit holding
//!    that still has residual deficit, buy one unit of the holding with the
//!    largest residual deficit (first one wins ties). Stop as soon as that
//!    holding is unaffordable.
//!
//! Step 4 runs in passes; the number of passes is capped (30 by default) and
//! a pass that buys nothing ends the loop, since a repeat would see the same
//! state.

use crate::aggregate::{aggregate_holdings, total_deficit};
use crate::allocator::{AllocationError, Allocator};
use crate::plan::{AllocationPlan, PlanLine, Strategy};
use crate::types::{safe_ratio, Portfolio, PurchaseUnit};

/// Tolerance when comparing the leftover against a unit price.
pub const PRICE_EPSILON: f64 = 1e-6;

/// Default cap on outer redistribution passes.
pub const DEFAULT_MAX_PASSES: usize = 30;

#[derive(Clone, Debug)]
pub struct WaterfallAllocator {
    max_passes: usize,
}

impl WaterfallAllocator {
    pub fn new() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    pub fn with_max_passes(max_passes: usize) -> Self {
        Self { max_passes }
    }

    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Steps 1–3: proportional split and rounding, no redistribution.
    pub fn split(
        &self,
        portfolio: &Portfolio,
        portfolio_value: f64,
        contribution: f64,
    ) -> AllocationPlan {
        let holdings = aggregate_holdings(portfolio, portfolio_value, contribution);
        let deficit_sum = total_deficit(&holdings);
        let mut lines: Vec<PlanLine> = holdings.iter().map(PlanLine::from_aggregate).collect();

        if deficit_sum <= 0.0 {
            return AllocationPlan::idle(Strategy::Waterfall, contribution, lines);
        }

        for line in &mut lines {
            line.allocated = safe_ratio(line.deficit, deficit_sum) * contribution;
            if !line.has_tradable_price() {
                continue;
            }
            match line.unit {
                PurchaseUnit::Continuous => {
                    line.quantity = line.allocated / line.price;
                    line.cost = line.allocated;
                }
                PurchaseUnit::Whole => {
                    line.quantity = (line.allocated / line.price).floor();
                    line.cost = line.quantity * line.price;
                }
            }
            line.residual_deficit = (line.deficit - line.cost).max(0.0);
        }

        let mut plan = AllocationPlan {
            strategy: Strategy::Waterfall,
            contribution,
            lines,
            leftover: 0.0,
            redistribution_passes: 0,
        };
        plan.settle();
        plan
    }

    /// One redistribution pass. Returns the number of units bought.
    pub fn redistribute(&self, plan: &mut AllocationPlan) -> usize {
        let mut bought = 0;

        while let Some(cheapest) = cheapest_eligible_price(&plan.lines) {
            if plan.leftover < cheapest - PRICE_EPSILON {
                break;
            }
            let Some(idx) = largest_residual(&plan.lines) else {
                break;
            };
            let price = plan.lines[idx].price;
            if plan.leftover < price - PRICE_EPSILON {
                break;
            }

            let line = &mut plan.lines[idx];
            line.quantity += 1.0;
            line.cost += price;
            line.residual_deficit = (line.residual_deficit - price).max(0.0);
            plan.leftover = (plan.leftover - price).max(0.0);
            bought += 1;
        }

        bought
    }

    /// Run redistribution passes until the leftover can no longer buy
    /// anything eligible, a pass makes no progress, or the cap is reached.
    pub fn converge(&self, plan: &mut AllocationPlan) {
        for _ in 0..self.max_passes {
            match cheapest_eligible_price(&plan.lines) {
                Some(cheapest) if plan.leftover >= cheapest - PRICE_EPSILON => {}
                _ => break,
            }
            if self.redistribute(plan) == 0 {
                break;
            }
            plan.redistribution_passes += 1;
        }
    }
}

impl Default for WaterfallAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for WaterfallAllocator {
    fn strategy(&self) -> Strategy {
        Strategy::Waterfall
    }

    fn allocate(
        &self,
        portfolio: &Portfolio,
        portfolio_value: f64,
        contribution: f64,
    ) -> Result<AllocationPlan, AllocationError> {
        let mut plan = self.split(portfolio, portfolio_value, contribution);
        self.converge(&mut plan);
        Ok(plan)
    }
}

fn is_eligible(line: &PlanLine) -> bool {
    line.unit == PurchaseUnit::Whole && line.residual_deficit > 0.0 && line.has_tradable_price()
}

/// Cheapest price among whole-unit lines that still have residual deficit.
pub fn cheapest_eligible_price(lines: &[PlanLine]) -> Option<f64> {
    lines
        .iter()
        .filter(|l| is_eligible(l))
        .map(|l| l.price)
        .fold(None, |acc, p| match acc {
            Some(m) if m <= p => Some(m),
            _ => Some(p),
        })
}

/// Eligible line with the largest residual deficit; earliest wins ties.
fn largest_residual(lines: &[PlanLine]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, l) in lines.iter().enumerate() {
        if !is_eligible(l) {
            continue;
        }
        match best {
            Some(b) if lines[b].residual_deficit >= l.residual_deficit => {}
            _ => best = Some(i),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Holding, HoldingKey};

    fn holding(ticker: &str, class: &str, price: f64, w: f64, unit: PurchaseUnit) -> Holding {
        Holding::new(
            HoldingKey::new("BR", class, "sub", ticker, ticker),
            0.0,
            price,
            w,
            unit,
        )
    }

    #[test]
    fn two_holding_example_from_empty_portfolio() {
        let pf = Portfolio::new(vec![
            holding("TESOURO", "RF", 10.0, 0.6, PurchaseUnit::Continuous),
            holding("BOVA11", "RV", 7.0, 0.4, PurchaseUnit::Whole),
        ]);
        let plan = WaterfallAllocator::new().allocate(&pf, 0.0, 1000.0).unwrap();

        let fi = &plan.lines[0];
        assert!((fi.deficit - 600.0).abs() < 1e-9);
        assert!((fi.quantity - 60.0).abs() < 1e-9);
        assert!((fi.cost - 600.0).abs() < 1e-9);

        let vi = &plan.lines[1];
        assert!((vi.deficit - 400.0).abs() < 1e-9);
        assert_eq!(vi.quantity, 57.0);
        assert!((vi.cost - 399.0).abs() < 1e-9);

        assert!((plan.leftover - 1.0).abs() < 1e-9, "leftover={}", plan.leftover);
        assert_eq!(plan.redistribution_passes, 0);
    }

    #[test]
    fn zero_deficit_returns_idle_plan() {
        let mut pf = Portfolio::new(vec![
            holding("A", "RV", 10.0, 0.5, PurchaseUnit::Whole),
            holding("B", "RV", 10.0, 0.5, PurchaseUnit::Whole),
        ]);
        pf.holdings[0].quantity = 100.0;
        pf.holdings[1].quantity = 100.0;
        pf.revalue();
        // contribution 0 keeps the portfolio exactly on target
        let plan = WaterfallAllocator::new().allocate(&pf, 2000.0, 0.0).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.leftover, 0.0);

        let empty = WaterfallAllocator::new()
            .allocate(&Portfolio::default(), 0.0, 500.0)
            .unwrap();
        assert!(empty.lines.is_empty());
        assert_eq!(empty.leftover, 500.0);
    }

    #[test]
    fn redistribution_spends_rounding_leftover_on_largest_residual() {
        // deficits 50/50 → 25 each; price 10 → 2 units each (cost 40), leftover 10
        let pf = Portfolio::new(vec![
            holding("A", "RV", 10.0, 0.5, PurchaseUnit::Whole),
            holding("B", "RV", 10.0, 0.5, PurchaseUnit::Whole),
        ]);
        let plan = WaterfallAllocator::new().allocate(&pf, 0.0, 50.0).unwrap();
        let qty: Vec<f64> = plan.lines.iter().map(|l| l.quantity).collect();
        // equal residuals (5, 5): first line wins the tie
        assert_eq!(qty, vec![3.0, 2.0]);
        assert!(plan.leftover.abs() < 1e-9);
        assert_eq!(plan.redistribution_passes, 1);
    }

    #[test]
    fn redistribution_is_idempotent_once_converged() {
        let pf = Portfolio::new(vec![
            holding("A", "RV", 10.0, 0.5, PurchaseUnit::Whole),
            holding("B", "RV", 30.0, 0.5, PurchaseUnit::Whole),
        ]);
        let a = WaterfallAllocator::new();
        let mut plan = a.allocate(&pf, 0.0, 95.0).unwrap();
        let before = plan.clone();
        assert_eq!(a.redistribute(&mut plan), 0);
        a.converge(&mut plan);
        assert_eq!(plan, before);
    }

    #[test]
    fn unaffordable_top_deficit_stops_without_spinning() {
        // B has the larger residual but costs more than the leftover; A is
        // affordable. The pass buys nothing and the loop ends.
        let pf = Portfolio::new(vec![
            holding("A", "RV", 3.0, 0.01, PurchaseUnit::Whole),
            holding("B", "RV", 600.0, 0.99, PurchaseUnit::Whole),
        ]);
        let plan = WaterfallAllocator::new().allocate(&pf, 0.0, 1000.0).unwrap();
        assert_eq!(plan.lines[0].quantity, 3.0);
        assert!((plan.lines[0].residual_deficit - 1.0).abs() < 1e-9);
        assert_eq!(plan.lines[1].quantity, 1.0);
        assert!((plan.leftover - 391.0).abs() < 1e-9);
        assert_eq!(plan.redistribution_passes, 0);
    }

    #[test]
    fn continuous_lines_are_never_redistribution_targets() {
        let pf = Portfolio::new(vec![
            holding("CDB", "RF", 1.0, 0.5, PurchaseUnit::Continuous),
            holding("IMAB11", "RF", 300.0, 0.5, PurchaseUnit::Whole),
        ]);
        let plan = WaterfallAllocator::new().allocate(&pf, 0.0, 1000.0).unwrap();
        // CDB: exactly 500; IMAB11: floor(500/300)=1 → 300; leftover 200 < 300
        assert!((plan.lines[0].cost - 500.0).abs() < 1e-9);
        assert_eq!(plan.lines[1].quantity, 1.0);
        assert!((plan.leftover - 200.0).abs() < 1e-9);
    }

    #[test]
    fn untradable_price_keeps_share_as_leftover() {
        let pf = Portfolio::new(vec![
            holding("A", "RV", 0.0, 0.5, PurchaseUnit::Whole),
            holding("B", "RF", 1.0, 0.5, PurchaseUnit::Continuous),
        ]);
        let plan = WaterfallAllocator::new().allocate(&pf, 0.0, 100.0).unwrap();
        assert_eq!(plan.lines[0].quantity, 0.0);
        assert!((plan.lines[1].cost - 50.0).abs() < 1e-9);
        assert!((plan.leftover - 50.0).abs() < 1e-9);
        assert!(plan.lines.iter().all(|l| l.quantity.is_finite()));
    }

    #[test]
    fn cheapest_eligible_ignores_covered_and_continuous_lines() {
        let pf = Portfolio::new(vec![
            holding("A", "RV", 7.0, 0.3, PurchaseUnit::Whole),
            holding("B", "RV", 4.0, 0.3, PurchaseUnit::Whole),
            holding("C", "RF", 1.0, 0.4, PurchaseUnit::Continuous),
        ]);
        let mut plan = WaterfallAllocator::new().split(&pf, 0.0, 100.0);
        // A: 4 × 7 = 28, B: 7 × 4 = 28; both keep a residual of 2
        assert_eq!(cheapest_eligible_price(&plan.lines), Some(4.0));
        for l in &mut plan.lines {
            l.residual_deficit = 0.0;
        }
        assert_eq!(cheapest_eligible_price(&plan.lines), None);
    }
}
