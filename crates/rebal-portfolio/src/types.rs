use std::collections::BTreeSet;
use std::fmt;

/// How a holding can be bought.
///
/// Fixed-income products are bought for any currency amount; shares, ETFs and
/// a few listed fixed-income funds only trade in whole lots.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PurchaseUnit {
    /// Any non-negative real quantity.
    Continuous,
    /// Whole units only (quantity is an integer).
    Whole,
}

impl PurchaseUnit {
    pub fn is_continuous(&self) -> bool {
        matches!(self, PurchaseUnit::Continuous)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseUnit::Continuous => "continuous",
            PurchaseUnit::Whole => "whole",
        }
    }
}

/// Full identity of a holding row.
///
/// Rows sharing the same key are one logical asset (for instance the same
/// fund bought through two brokers); [`crate::aggregate_holdings`] folds them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HoldingKey {
    pub geography: String,
    pub asset_class: String,
    pub subclass: String,
    pub asset: String,
    pub ticker: String,
}

impl HoldingKey {
    pub fn new(
        geography: impl Into<String>,
        asset_class: impl Into<String>,
        subclass: impl Into<String>,
        asset: impl Into<String>,
        ticker: impl Into<String>,
    ) -> Self {
        Self {
            geography: geography.into(),
            asset_class: asset_class.into(),
            subclass: subclass.into(),
            asset: asset.into(),
            ticker: ticker.into(),
        }
    }
}

impl fmt::Display for HoldingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{} ({})",
            self.geography, self.asset_class, self.subclass, self.asset, self.ticker
        )
    }
}

/// One row of the portfolio.
///
/// `value` is kept as its own field: it normally equals `quantity * price`
/// but a liquidity sweep books cash into it directly until the next
/// [`Holding::revalue`].
#[derive(Clone, Debug, PartialEq)]
pub struct Holding {
    pub key: HoldingKey,
    pub quantity: f64,
    pub price: f64,
    pub value: f64,
    /// Fraction of total portfolio value (0.25 = 25 %).
    pub target_weight: f64,
    pub unit: PurchaseUnit,
}

impl Holding {
    /// Build a holding whose value is `quantity * price`.
    pub fn new(
        key: HoldingKey,
        quantity: f64,
        price: f64,
        target_weight: f64,
        unit: PurchaseUnit,
    ) -> Self {
        Self {
            key,
            quantity,
            price,
            value: quantity * price,
            target_weight,
            unit,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.key.ticker
    }

    pub fn asset_class(&self) -> &str {
        &self.key.asset_class
    }

    /// Price usable for buying: strictly positive and finite.
    pub fn has_tradable_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }

    /// Recompute `value` from quantity and price.
    pub fn revalue(&mut self) {
        self.value = self.quantity * self.price;
    }

    /// Target value for a given portfolio size, minus what is held, floored at 0.
    pub fn deficit(&self, portfolio_value: f64) -> f64 {
        (self.target_weight * portfolio_value - self.value).max(0.0)
    }
}

/// Ordered collection of holdings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Portfolio {
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn new(holdings: Vec<Holding>) -> Self {
        Self { holdings }
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    /// Σ value over all rows.
    pub fn total_value(&self) -> f64 {
        self.holdings.iter().map(|h| h.value).sum()
    }

    /// Σ target weight over all rows (≈ 1.0 for a well-formed portfolio).
    pub fn total_target_weight(&self) -> f64 {
        self.holdings.iter().map(|h| h.target_weight).sum()
    }

    /// Recompute every row's value from quantity × price.
    pub fn revalue(&mut self) {
        for h in &mut self.holdings {
            h.revalue();
        }
    }

    /// Index of the first row carrying `ticker`.
    pub fn position_of(&self, ticker: &str) -> Option<usize> {
        self.holdings.iter().position(|h| h.key.ticker == ticker)
    }

    /// Distinct asset classes, sorted.
    pub fn asset_classes(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.holdings.iter().map(|h| h.asset_class()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Σ target weight of the rows in `asset_class`.
    pub fn class_target_weight(&self, asset_class: &str) -> f64 {
        self.holdings
            .iter()
            .filter(|h| h.asset_class() == asset_class)
            .map(|h| h.target_weight)
            .sum()
    }

    /// Actual weight of `asset_class` (0 when the portfolio is worth nothing).
    pub fn class_weight(&self, asset_class: &str) -> f64 {
        let class_value: f64 = self
            .holdings
            .iter()
            .filter(|h| h.asset_class() == asset_class)
            .map(|h| h.value)
            .sum();
        safe_ratio(class_value, self.total_value())
    }

    /// Σ max(0, target_weight × total − value), computed per row.
    pub fn outstanding_deficit(&self) -> f64 {
        let total = self.total_value();
        self.holdings.iter().map(|h| h.deficit(total)).sum()
    }

    /// Weight of row `idx` in the portfolio (0 when the portfolio is empty).
    pub fn weight_of(&self, idx: usize) -> f64 {
        match self.holdings.get(idx) {
            Some(h) => safe_ratio(h.value, self.total_value()),
            None => 0.0,
        }
    }
}

/// `num / den`, or 0 when the result would not be finite.
pub fn safe_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 || !den.is_finite() {
        return 0.0;
    }
    let r = num / den;
    if r.is_finite() {
        r
    } else {
        0.0
    }
}
