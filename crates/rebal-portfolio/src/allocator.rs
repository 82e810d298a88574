//! rebal-portfolio: allocator seam
//!
//! One operation, two implementations:
//! - [`crate::WaterfallAllocator`]: proportional deficit split, whole-unit
//!   rounding, then greedy spending of the rounding leftover. Never fails.
//! - [`crate::MilpAllocator`]: mixed-integer program minimising the total
//!   unmet deficit under the contribution budget. Fails when the solver does
//!   not report an optimal solution.
//!
//! Callers pick an implementation per portfolio; the backtest runs one of
//! each side by side.

use crate::plan::{AllocationPlan, Strategy};
use crate::types::Portfolio;

// ─── Error ───────────────────────────────────────────────────────────────────

/// Why an allocator could not produce a plan.
#[derive(Clone, Debug, PartialEq)]
pub enum AllocationError {
    /// The model has no feasible point (e.g. a cardinality floor the budget
    /// cannot pay for, or no budget at all while deficits remain).
    Infeasible { reason: String },
    /// The model is unbounded.
    Unbounded,
    /// Any other solver outcome that is not an optimal solution.
    Solver(String),
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Infeasible { reason } => write!(f, "allocation infeasible: {reason}"),
            Self::Unbounded => write!(f, "allocation model is unbounded"),
            Self::Solver(msg) => write!(f, "solver did not reach an optimal solution: {msg}"),
        }
    }
}

impl std::error::Error for AllocationError {}

// ─── Allocator ───────────────────────────────────────────────────────────────

/// Turns one contribution event into a purchase plan.
pub trait Allocator {
    /// Tag recorded in ledgers and reports.
    fn strategy(&self) -> Strategy;

    /// Plan purchases for `contribution` given the portfolio and its current
    /// total value. Does not mutate the portfolio.
    fn allocate(
        &self,
        portfolio: &Portfolio,
        portfolio_value: f64,
        contribution: f64,
    ) -> Result<AllocationPlan, AllocationError>;

    /// Single-shot entry point: `None` means "no allocation found".
    fn allocate_once(
        &self,
        portfolio: &Portfolio,
        portfolio_value: f64,
        contribution: f64,
    ) -> Option<AllocationPlan> {
        self.allocate(portfolio, portfolio_value, contribution).ok()
    }
}

impl<A: Allocator + ?Sized> Allocator for Box<A> {
    fn strategy(&self) -> Strategy {
        (**self).strategy()
    }

    fn allocate(
        &self,
        portfolio: &Portfolio,
        portfolio_value: f64,
        contribution: f64,
    ) -> Result<AllocationPlan, AllocationError> {
        (**self).allocate(portfolio, portfolio_value, contribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysInfeasible;

    impl Allocator for AlwaysInfeasible {
        fn strategy(&self) -> Strategy {
            Strategy::Milp
        }

        fn allocate(
            &self,
            _portfolio: &Portfolio,
            _portfolio_value: f64,
            _contribution: f64,
        ) -> Result<AllocationPlan, AllocationError> {
            Err(AllocationError::Infeasible {
                reason: "test".to_string(),
            })
        }
    }

    #[test]
    fn allocate_once_maps_failure_to_none() {
        let a: Box<dyn Allocator> = Box::new(AlwaysInfeasible);
        assert!(a.allocate_once(&Portfolio::default(), 0.0, 100.0).is_none());
        assert_eq!(a.strategy(), Strategy::Milp);
    }

    #[test]
    fn allocation_error_display() {
        assert!(!AllocationError::Unbounded.to_string().is_empty());
        assert!(AllocationError::Infeasible {
            reason: "k_min".into()
        }
        .to_string()
        .contains("k_min"));
        assert!(AllocationError::Solver("timeout".into())
            .to_string()
            .contains("timeout"));
    }
}
