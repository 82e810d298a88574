//! Mixed-integer allocator.
//!
//! Model, per aggregated holding `i` with price `p_i` and deficit `d_i`:
//!
//! ```text
//! minimise    Σ gap_i
//! subject to  Σ p_i · q_i            ≤ budget
//!             gap_i + p_i · q_i      ≥ d_i
//!             q_i ≥ 0, gap_i ≥ 0
//!             q_i integer            for whole-unit holdings
//! with k_min:
//!             Σ s_i                  ≥ k_min
//!             q_i ≥ min_unit_i · s_i
//!             q_i ≤ (budget / p_i) · s_i
//!             s_i binary
//! ```
//!
//! `min_unit_i` is 1 for whole-unit holdings and `1 / p_i` for continuous
//! ones. Holdings without a tradable price are pinned to zero.
//!
//! Solved with `good_lp` on the pure-Rust `microlp` backend.

use good_lp::{
    constraint, microlp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};

use crate::aggregate::{aggregate_holdings, total_deficit};
use crate::allocator::{AllocationError, Allocator};
use crate::plan::{AllocationPlan, PlanLine, Strategy};
use crate::types::{Portfolio, PurchaseUnit};

#[derive(Clone, Debug, Default)]
pub struct MilpAllocator {
    /// Minimum number of holdings that must receive a purchase.
    min_selected: Option<usize>,
}

impl MilpAllocator {
    pub fn new() -> Self {
        Self { min_selected: None }
    }

    pub fn with_min_selected(min_selected: Option<usize>) -> Self {
        Self { min_selected }
    }

    pub fn min_selected(&self) -> Option<usize> {
        self.min_selected
    }
}

struct LineVars {
    quantity: Variable,
    gap: Variable,
    selected: Option<Variable>,
}

impl Allocator for MilpAllocator {
    fn strategy(&self) -> Strategy {
        Strategy::Milp
    }

    fn allocate(
        &self,
        portfolio: &Portfolio,
        portfolio_value: f64,
        contribution: f64,
    ) -> Result<AllocationPlan, AllocationError> {
        let holdings = aggregate_holdings(portfolio, portfolio_value, contribution);
        let mut lines: Vec<PlanLine> = holdings.iter().map(PlanLine::from_aggregate).collect();

        let needs_cardinality = matches!(self.min_selected, Some(k) if k > 0);
        if total_deficit(&holdings) <= 0.0 && !needs_cardinality {
            return Ok(AllocationPlan::idle(Strategy::Milp, contribution, lines));
        }
        if !(contribution.is_finite() && contribution > 0.0) {
            return Err(AllocationError::Infeasible {
                reason: format!("no budget ({contribution}) for an outstanding deficit"),
            });
        }
        if let Some(k) = self.min_selected {
            let tradable = lines.iter().filter(|l| l.has_tradable_price()).count();
            if k > tradable {
                return Err(AllocationError::Infeasible {
                    reason: format!("k_min={k} exceeds {tradable} tradable holdings"),
                });
            }
        }

        let budget = contribution;
        let mut vars = ProblemVariables::new();
        let mut line_vars: Vec<LineVars> = Vec::with_capacity(lines.len());

        for line in &lines {
            let cap = if line.has_tradable_price() {
                budget / line.price
            } else {
                0.0
            };
            let quantity = match line.unit {
                PurchaseUnit::Continuous => vars.add(variable().min(0.0).max(cap)),
                PurchaseUnit::Whole => vars.add(variable().integer().min(0.0).max(cap.floor())),
            };
            let gap = vars.add(variable().min(0.0));
            let selected = self.min_selected.map(|_| vars.add(variable().binary()));
            line_vars.push(LineVars {
                quantity,
                gap,
                selected,
            });
        }

        let objective: Expression = line_vars.iter().map(|v| v.gap).sum();
        let mut model = vars.minimise(objective).using(microlp);

        let spend: Expression = lines
            .iter()
            .zip(&line_vars)
            .filter(|(l, _)| l.has_tradable_price())
            .map(|(l, v)| l.price * v.quantity)
            .sum();
        model = model.with(constraint!(spend <= budget));

        for (line, v) in lines.iter().zip(&line_vars) {
            let deficit = line.deficit;
            if line.has_tradable_price() {
                let price = line.price;
                model = model.with(constraint!(v.gap + price * v.quantity >= deficit));
            } else {
                model = model.with(constraint!(v.gap >= deficit));
            }

            if let Some(s) = v.selected {
                if line.has_tradable_price() {
                    let min_unit = match line.unit {
                        PurchaseUnit::Whole => 1.0,
                        PurchaseUnit::Continuous => 1.0 / line.price,
                    };
                    let big_m = budget / line.price;
                    model = model.with(constraint!(v.quantity >= min_unit * s));
                    model = model.with(constraint!(v.quantity <= big_m * s));
                } else {
                    model = model.with(constraint!(s <= 0.0));
                }
            }
        }

        if let Some(k) = self.min_selected {
            let k = k as f64;
            let picked: Expression = line_vars.iter().filter_map(|v| v.selected).sum();
            model = model.with(constraint!(picked >= k));
        }

        let solution = model.solve().map_err(map_resolution_error)?;

        for (line, v) in lines.iter_mut().zip(&line_vars) {
            if !line.has_tradable_price() {
                continue;
            }
            let raw = solution.value(v.quantity).max(0.0);
            line.quantity = match line.unit {
                PurchaseUnit::Whole => raw.round(),
                PurchaseUnit::Continuous => raw,
            };
            line.cost = line.quantity * line.price;
            line.allocated = line.cost;
            line.residual_deficit = (line.deficit - line.cost).max(0.0);
        }

        let mut plan = AllocationPlan {
            strategy: Strategy::Milp,
            contribution,
            lines,
            leftover: 0.0,
            redistribution_passes: 0,
        };
        plan.settle();
        Ok(plan)
    }
}

fn map_resolution_error(err: ResolutionError) -> AllocationError {
    match err {
        ResolutionError::Infeasible => AllocationError::Infeasible {
            reason: "solver reported no feasible point".to_string(),
        },
        ResolutionError::Unbounded => AllocationError::Unbounded,
        other => AllocationError::Solver(other.to_string()),
    }
}
