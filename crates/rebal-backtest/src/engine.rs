use chrono::NaiveDate;

use rebal_md::{MarketSnapshot, PriceLookup, RetryPolicy, SeriesMap, SeriesProvider, SnapshotError};
use rebal_portfolio::{
    safe_ratio, AllocationError, AllocationPlan, Allocator, MilpAllocator, Portfolio, Strategy,
    WaterfallAllocator,
};

use crate::calendar::{data_window, step_dates};
use crate::observer::{NoopObserver, SimulationObserver};
use crate::types::{
    ContributionLedgerEntry, LaneSnapshot, LedgerKind, SimulationConfig, SimulationReport,
    SimulationSnapshot,
};

/// Simulation error variants.
#[derive(Clone, Debug, PartialEq)]
pub enum SimulationError {
    /// Rejected configuration (non-finite contribution, zero months, ...).
    InvalidConfig(String),
    /// An operation was called in the wrong lifecycle state.
    InvalidState {
        expected: &'static str,
        found: SimulationState,
    },
    /// Market data could not be assembled (missing FX baseline).
    MarketData(SnapshotError),
    /// The fallback allocator failed (forwarded).
    Allocation(AllocationError),
}

impl core::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SimulationError::InvalidConfig(msg) => write!(f, "invalid simulation config: {msg}"),
            SimulationError::InvalidState { expected, found } => {
                write!(f, "simulation is {found:?}, expected {expected}")
            }
            SimulationError::MarketData(e) => write!(f, "market data: {e}"),
            SimulationError::Allocation(e) => write!(f, "allocation: {e}"),
        }
    }
}

impl std::error::Error for SimulationError {}

/// Lifecycle: `Initialized → DataFetched → Stepping → Completed`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimulationState {
    Initialized,
    DataFetched,
    /// `month` steps done so far (1-based count).
    Stepping { month: usize },
    Completed,
}

/// One independently evolving portfolio copy and its allocator.
struct Lane {
    strategy: Strategy,
    allocator: Box<dyn Allocator>,
    portfolio: Portfolio,
    idle_cash: f64,
}

/// Monthly two-lane contribution simulator.
///
/// Per step:
/// 1. refresh prices from the market snapshot (stale prices are kept)
/// 2. invested capital = initial value + month × contribution
/// 3. each lane allocates the contribution; a failing allocator falls back
///    to the waterfall for that month only
/// 4. purchases are applied and recorded in the ledger
/// 5. leftover is swept into the liquidity holding (one currency unit per unit)
/// 6. a snapshot with value, deficit, corrected return and class drift is recorded
pub struct Simulator<O: SimulationObserver = NoopObserver> {
    config: SimulationConfig,
    initial_value: f64,
    lanes: Vec<Lane>,
    fallback: WaterfallAllocator,
    classes: Vec<String>,
    dates: Vec<NaiveDate>,
    market: MarketSnapshot,
    state: SimulationState,
    ledger: Vec<ContributionLedgerEntry>,
    snapshots: Vec<SimulationSnapshot>,
    observer: O,
}

impl Simulator<NoopObserver> {
    /// Waterfall lane + optimizing lane, both starting from `initial`.
    pub fn new(initial: Portfolio, config: SimulationConfig) -> Result<Self, SimulationError> {
        let allocators: Vec<Box<dyn Allocator>> = vec![
            Box::new(WaterfallAllocator::new()),
            Box::new(MilpAllocator::with_min_selected(config.min_selected)),
        ];
        Self::with_allocators(initial, config, allocators)
    }

    /// One lane per allocator, in order. The first lane is the reference for
    /// class target weights.
    pub fn with_allocators(
        initial: Portfolio,
        config: SimulationConfig,
        allocators: Vec<Box<dyn Allocator>>,
    ) -> Result<Self, SimulationError> {
        validate_config(&config)?;
        if allocators.is_empty() {
            return Err(SimulationError::InvalidConfig(
                "at least one allocator is required".to_string(),
            ));
        }

        let initial_value = initial.total_value();
        let classes = initial.asset_classes();
        let dates = step_dates(config.end_date, config.months);
        let lanes = allocators
            .into_iter()
            .map(|allocator| Lane {
                strategy: allocator.strategy(),
                allocator,
                portfolio: initial.clone(),
                idle_cash: 0.0,
            })
            .collect();

        Ok(Self {
            config,
            initial_value,
            lanes,
            fallback: WaterfallAllocator::new(),
            classes,
            dates,
            market: MarketSnapshot::default(),
            state: SimulationState::Initialized,
            ledger: Vec::new(),
            snapshots: Vec::new(),
            observer: NoopObserver,
        })
    }
}

impl<O: SimulationObserver> Simulator<O> {
    /// Replace the observer. Must be called before stepping.
    pub fn with_observer<P: SimulationObserver>(self, observer: P) -> Simulator<P> {
        Simulator {
            config: self.config,
            initial_value: self.initial_value,
            lanes: self.lanes,
            fallback: self.fallback,
            classes: self.classes,
            dates: self.dates,
            market: self.market,
            state: self.state,
            ledger: self.ledger,
            snapshots: self.snapshots,
            observer,
        }
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Inclusive window the market snapshot must cover.
    pub fn data_window(&self) -> (NaiveDate, NaiveDate) {
        data_window(&self.dates, self.config.end_date)
    }

    pub fn ledger(&self) -> &[ContributionLedgerEntry] {
        &self.ledger
    }

    pub fn snapshots(&self) -> &[SimulationSnapshot] {
        &self.snapshots
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn portfolio(&self, strategy: Strategy) -> Option<&Portfolio> {
        self.lanes
            .iter()
            .find(|l| l.strategy == strategy)
            .map(|l| &l.portfolio)
    }

    /// Install a pre-fetched market snapshot. `Initialized → DataFetched`.
    pub fn load_market(&mut self, market: MarketSnapshot) -> Result<(), SimulationError> {
        self.expect_state(SimulationState::Initialized, "Initialized")?;
        self.market = market;
        self.state = SimulationState::DataFetched;
        Ok(())
    }

    /// Fetch every series the portfolio needs over [`Self::data_window`].
    /// A missing FX series aborts; per-ticker gaps are tolerated.
    pub fn fetch_market(
        &mut self,
        provider: &dyn SeriesProvider,
        map: &SeriesMap,
        fx_symbol: &str,
        retry: RetryPolicy,
    ) -> Result<(), SimulationError> {
        self.expect_state(SimulationState::Initialized, "Initialized")?;
        let (start, end) = self.data_window();
        let universe: Vec<(String, String)> = self.lanes[0]
            .portfolio
            .holdings
            .iter()
            .map(|h| (h.key.ticker.clone(), h.key.geography.clone()))
            .collect();
        let market = MarketSnapshot::fetch(
            universe.iter().map(|(t, g)| (t.as_str(), g.as_str())),
            map,
            provider,
            fx_symbol,
            start,
            end,
            retry,
        )
        .map_err(SimulationError::MarketData)?;
        self.load_market(market)
    }

    /// Run one month. Returns `None` once every month has been simulated.
    pub fn step(&mut self) -> Result<Option<&SimulationSnapshot>, SimulationError> {
        let done = match self.state {
            SimulationState::DataFetched => 0,
            SimulationState::Stepping { month } => month,
            SimulationState::Completed => return Ok(None),
            found => {
                return Err(SimulationError::InvalidState {
                    expected: "DataFetched or Stepping",
                    found,
                })
            }
        };

        let Some(&date) = self.dates.get(done) else {
            self.state = SimulationState::Completed;
            return Ok(None);
        };
        let month = done + 1;
        self.observer.on_month_start(month, date);

        // 1. prices
        self.refresh_prices(month, date);

        // 2. invested capital
        let invested = self.initial_value + month as f64 * self.config.contribution;

        // 3–5. allocate, apply, sweep
        let mut lane_stats: Vec<(bool, f64)> = Vec::with_capacity(self.lanes.len());
        for i in 0..self.lanes.len() {
            let stats = self.contribute(i, month, date)?;
            lane_stats.push(stats);
        }

        // 6. snapshot
        let reference = &self.lanes[0].portfolio;
        let targets: Vec<(String, f64)> = self
            .classes
            .iter()
            .map(|c| (c.clone(), reference.class_target_weight(c)))
            .collect();

        let lanes = self
            .lanes
            .iter()
            .zip(lane_stats)
            .map(|(lane, (fell_back, leftover))| {
                let value = lane.portfolio.total_value();
                LaneSnapshot {
                    strategy: lane.strategy,
                    value,
                    deficit: lane.portfolio.outstanding_deficit(),
                    corrected_return: corrected_return(value, invested),
                    drift_pp: targets
                        .iter()
                        .map(|(c, target)| {
                            (c.clone(), (lane.portfolio.class_weight(c) - target) * 100.0)
                        })
                        .collect(),
                    fell_back,
                    leftover,
                    idle_cash: lane.idle_cash,
                }
            })
            .collect();

        let snapshot = SimulationSnapshot {
            month,
            date,
            invested,
            lanes,
        };
        self.observer.on_snapshot(&snapshot);
        self.snapshots.push(snapshot);

        self.state = if month >= self.dates.len() {
            SimulationState::Completed
        } else {
            SimulationState::Stepping { month }
        };
        Ok(self.snapshots.last())
    }

    /// Step through every remaining month and hand back the report.
    pub fn run(mut self) -> Result<SimulationReport, SimulationError> {
        if self.state == SimulationState::Initialized {
            return Err(SimulationError::InvalidState {
                expected: "DataFetched",
                found: self.state,
            });
        }
        while self.step()?.is_some() {}
        Ok(self.into_report())
    }

    pub fn into_report(self) -> SimulationReport {
        SimulationReport {
            initial_value: self.initial_value,
            snapshots: self.snapshots,
            ledger: self.ledger,
            portfolios: self
                .lanes
                .into_iter()
                .map(|l| (l.strategy, l.portfolio))
                .collect(),
            classes: self.classes,
        }
    }

    // -----------------------------------------------------------------------

    fn expect_state(
        &self,
        expected: SimulationState,
        name: &'static str,
    ) -> Result<(), SimulationError> {
        if self.state != expected {
            return Err(SimulationError::InvalidState {
                expected: name,
                found: self.state,
            });
        }
        Ok(())
    }

    fn refresh_prices(&mut self, month: usize, date: NaiveDate) {
        let Some(first) = self.lanes.first() else {
            return;
        };
        // Every lane holds the same tickers in the same rows.
        let mut prices: Vec<Option<f64>> = Vec::with_capacity(first.portfolio.len());
        let mut stale: Vec<String> = Vec::new();
        for h in &first.portfolio.holdings {
            match self.market.price_at(h.ticker(), date) {
                PriceLookup::Price(p) if p.is_finite() => prices.push(Some(p)),
                PriceLookup::Price(_) | PriceLookup::Untracked => prices.push(None),
                PriceLookup::Stale => {
                    if !stale.iter().any(|t| t == h.ticker()) {
                        stale.push(h.ticker().to_string());
                    }
                    prices.push(None);
                }
            }
        }
        for ticker in &stale {
            self.observer.on_stale_price(month, date, ticker);
        }

        for lane in &mut self.lanes {
            for (h, p) in lane.portfolio.holdings.iter_mut().zip(&prices) {
                if let Some(p) = p {
                    h.price = *p;
                }
            }
            lane.portfolio.revalue();
        }
    }

    /// Allocate, apply and sweep for lane `i`. Returns (fell_back, leftover).
    fn contribute(
        &mut self,
        i: usize,
        month: usize,
        date: NaiveDate,
    ) -> Result<(bool, f64), SimulationError> {
        let contribution = self.config.contribution;
        let lane = &mut self.lanes[i];
        let pv = lane.portfolio.total_value();

        let (plan, fell_back) = match lane.allocator.allocate(&lane.portfolio, pv, contribution) {
            Ok(plan) => (plan, false),
            Err(e) => {
                self.observer.on_fallback(month, lane.strategy, &e);
                let plan = self
                    .fallback
                    .allocate(&lane.portfolio, pv, contribution)
                    .map_err(SimulationError::Allocation)?;
                (plan, true)
            }
        };

        record_purchases(&mut self.ledger, lane, &plan, month, date);
        plan.apply_to(&mut lane.portfolio);

        let leftover = plan.leftover;
        if leftover > 0.0 {
            match lane.portfolio.position_of(&self.config.liquidity_ticker) {
                Some(idx) => {
                    let total = lane.portfolio.total_value();
                    let h = &lane.portfolio.holdings[idx];
                    let pre_weight = safe_ratio(h.value, total);
                    self.ledger.push(ContributionLedgerEntry {
                        month,
                        date,
                        lane: lane.strategy,
                        strategy: plan.strategy,
                        kind: LedgerKind::Sweep,
                        key: h.key.clone(),
                        quantity_held: h.quantity,
                        price: h.price,
                        value: h.value,
                        pre_weight,
                        target_weight: h.target_weight,
                        deviation: pre_weight - h.target_weight,
                        quantity: leftover,
                        amount: leftover,
                    });
                    let h = &mut lane.portfolio.holdings[idx];
                    h.quantity += leftover;
                    h.value += leftover;
                    self.observer
                        .on_sweep(month, lane.strategy, &self.config.liquidity_ticker, leftover);
                }
                None => lane.idle_cash += leftover,
            }
        }

        Ok((fell_back, leftover))
    }
}

fn record_purchases(
    ledger: &mut Vec<ContributionLedgerEntry>,
    lane: &Lane,
    plan: &AllocationPlan,
    month: usize,
    date: NaiveDate,
) {
    let total = lane.portfolio.total_value();
    for line in plan.purchases() {
        if lane.portfolio.holdings.get(line.row).is_none() {
            continue;
        }
        // Aggregated identity: quantity and value across every row sharing the key.
        let (quantity_held, value) = lane
            .portfolio
            .holdings
            .iter()
            .filter(|r| r.key == line.key)
            .fold((0.0, 0.0), |(q, v), r| (q + r.quantity, v + r.value));
        let pre_weight = safe_ratio(value, total);
        ledger.push(ContributionLedgerEntry {
            month,
            date,
            lane: lane.strategy,
            strategy: plan.strategy,
            kind: LedgerKind::Purchase,
            key: line.key.clone(),
            quantity_held,
            price: line.price,
            value,
            pre_weight,
            target_weight: line.target_weight,
            deviation: pre_weight - line.target_weight,
            quantity: line.quantity,
            amount: line.cost,
        });
    }
}

/// Value over invested capital, minus one. Zero while nothing is invested.
fn corrected_return(value: f64, invested: f64) -> f64 {
    if invested.abs() < f64::EPSILON {
        0.0
    } else {
        value / invested - 1.0
    }
}

fn validate_config(config: &SimulationConfig) -> Result<(), SimulationError> {
    if !config.contribution.is_finite() || config.contribution < 0.0 {
        return Err(SimulationError::InvalidConfig(format!(
            "contribution must be a finite non-negative amount, got {}",
            config.contribution
        )));
    }
    if config.months == 0 {
        return Err(SimulationError::InvalidConfig(
            "months must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Run a full simulation over a pre-fetched market snapshot.
pub fn simulate(
    initial: Portfolio,
    config: SimulationConfig,
    market: MarketSnapshot,
) -> Result<SimulationReport, SimulationError> {
    let mut sim = Simulator::new(initial, config)?;
    sim.load_market(market)?;
    sim.run()
}
