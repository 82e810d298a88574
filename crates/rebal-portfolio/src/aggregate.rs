//! Aggregation pass: portfolio rows → one entry per holding identity.
//!
//! A single logical asset may span several rows (lots bought through
//! different custodians). Both allocators work on the deduplicated list this
//! module produces, so deficits are summed per identity instead of relying
//! on row order.
//!
//! Output order is the order in which each identity first appears in the
//! portfolio. Purchases for an identity are booked on its first row.

use std::collections::HashMap;

use crate::types::{HoldingKey, Portfolio, PurchaseUnit};

/// One deduplicated holding with its deficit for a contribution event.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedHolding {
    pub key: HoldingKey,
    /// Source row indices in portfolio order; never empty.
    pub rows: Vec<usize>,
    pub unit: PurchaseUnit,
    /// Price of the first row.
    pub price: f64,
    pub quantity: f64,
    pub value: f64,
    pub target_weight: f64,
    /// Σ over rows of max(0, target_weight × (portfolio_value + contribution) − value).
    pub deficit: f64,
}

impl AggregatedHolding {
    /// Row that receives purchases.
    pub fn booking_row(&self) -> usize {
        self.rows[0]
    }

    pub fn has_tradable_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Fold rows sharing a [`HoldingKey`] and compute each identity's deficit
/// against the post-contribution portfolio size.
pub fn aggregate_holdings(
    portfolio: &Portfolio,
    portfolio_value: f64,
    contribution: f64,
) -> Vec<AggregatedHolding> {
    let ideal_base = portfolio_value + contribution;

    let mut out: Vec<AggregatedHolding> = Vec::new();
    let mut index: HashMap<&HoldingKey, usize> = HashMap::new();

    for (row, h) in portfolio.holdings.iter().enumerate() {
        let deficit = h.deficit(ideal_base);
        match index.get(&h.key) {
            Some(&i) => {
                let agg = &mut out[i];
                agg.rows.push(row);
                agg.quantity += h.quantity;
                agg.value += h.value;
                agg.target_weight += h.target_weight;
                agg.deficit += deficit;
            }
            None => {
                index.insert(&h.key, out.len());
                out.push(AggregatedHolding {
                    key: h.key.clone(),
                    rows: vec![row],
                    unit: h.unit,
                    price: h.price,
                    quantity: h.quantity,
                    value: h.value,
                    target_weight: h.target_weight,
                    deficit,
                });
            }
        }
    }

    out
}

/// Σ deficit over an aggregated list.
pub fn total_deficit(holdings: &[AggregatedHolding]) -> f64 {
    holdings.iter().map(|h| h.deficit).sum()
}
