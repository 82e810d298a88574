//! rebal-portfolio
//!
//! Contribution allocation for a target-weight portfolio:
//! - Holdings, per-row deficits, class weights
//! - Aggregation of duplicate rows into one identity
//! - One `Allocator` seam with two implementations:
//!   deficit waterfall (greedy) and mixed-integer (good_lp / microlp)
//! - Pure deterministic logic (no IO, no clock, no market data)

mod aggregate;
mod plan;
mod types;

pub mod allocator;
pub mod milp;
pub mod waterfall;

pub use aggregate::{aggregate_holdings, total_deficit, AggregatedHolding};
pub use allocator::{AllocationError, Allocator};
pub use milp::MilpAllocator;
pub use plan::{AllocationPlan, PlanLine, Strategy};
pub use types::{safe_ratio, Holding, HoldingKey, Portfolio, PurchaseUnit};
pub use waterfall::{WaterfallAllocator, DEFAULT_MAX_PASSES, PRICE_EPSILON};

/// Build the allocator for a strategy tag.
pub fn allocator_for(strategy: Strategy, min_selected: Option<usize>) -> Box<dyn Allocator> {
    match strategy {
        Strategy::Waterfall => Box::new(WaterfallAllocator::new()),
        Strategy::Milp => Box::new(MilpAllocator::with_min_selected(min_selected)),
    }
}
