//! Scenario: stale-price policy.
//!
//! A ticker whose series only starts in the third month keeps its initial
//! price for the first two months. A ticker missing one month inside its
//! series keeps the previous month's price for that month.
//!
//! GREEN when:
//! - the observer is told about the stale ticker in months 1 and 2 only
//! - the price stays unchanged while stale and is refreshed in month 3
//! - a mid-series gap keeps last month's price and the lane total only grows
//!   by the contribution

use chrono::NaiveDate;
use rebal_backtest::{RecordingObserver, SimulationConfig, Simulator};
use rebal_md::{MarketSnapshot, MonthlySeries};
use rebal_portfolio::{Holding, HoldingKey, Portfolio, PurchaseUnit, Strategy};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn bova_price(sim: &Simulator<RecordingObserver>) -> f64 {
    sim.portfolio(Strategy::Waterfall).unwrap().holdings[1].price
}

#[test]
fn scenario_stale_price_keeps_previous_value() {
    let initial = Portfolio::new(vec![
        Holding::new(
            HoldingKey::new("BR", "RF", "Pós", "Tesouro Selic", "SELIC"),
            1000.0,
            1.0,
            0.5,
            PurchaseUnit::Continuous,
        ),
        Holding::new(
            HoldingKey::new("BR", "RV", "Ações", "BOVA11", "BOVA11"),
            10.0,
            100.0,
            0.5,
            PurchaseUnit::Whole,
        ),
    ]);
    let bova: MonthlySeries = [(d(2024, 2, 29), 150.0)].into_iter().collect();
    let market = MarketSnapshot::default().with_series("BOVA11", bova);

    let config = SimulationConfig {
        contribution: 500.0,
        months: 3,
        end_date: d(2024, 3, 1),
        min_selected: None,
        liquidity_ticker: "SELIC".to_string(),
    };
    let mut sim = Simulator::new(initial, config)
        .unwrap()
        .with_observer(RecordingObserver::new());
    assert_eq!(sim.dates(), &[d(2024, 1, 1), d(2024, 2, 1), d(2024, 3, 1)]);
    sim.load_market(market).unwrap();

    sim.step().unwrap();
    assert_eq!(bova_price(&sim), 100.0);
    sim.step().unwrap();
    assert_eq!(bova_price(&sim), 100.0);
    sim.step().unwrap();
    assert_eq!(bova_price(&sim), 150.0);

    let obs = sim.observer();
    assert_eq!(obs.stale_tickers(1), vec!["BOVA11"]);
    assert_eq!(obs.stale_tickers(2), vec!["BOVA11"]);
    assert!(obs.stale_tickers(3).is_empty());
}

#[test]
fn scenario_missing_month_inside_series_keeps_last_price() {
    let initial = Portfolio::new(vec![
        Holding::new(
            HoldingKey::new("BR", "RF", "Pós", "Tesouro Selic", "SELIC"),
            1000.0,
            1.0,
            0.5,
            PurchaseUnit::Continuous,
        ),
        Holding::new(
            HoldingKey::new("BR", "RV", "Ações", "BOVA11", "BOVA11"),
            10.0,
            100.0,
            0.5,
            PurchaseUnit::Whole,
        ),
    ]);
    // no January close
    let bova: MonthlySeries = [(d(2023, 12, 29), 120.0), (d(2024, 2, 29), 150.0)]
        .into_iter()
        .collect();
    let market = MarketSnapshot::default().with_series("BOVA11", bova);

    let config = SimulationConfig {
        contribution: 500.0,
        months: 3,
        end_date: d(2024, 3, 1),
        min_selected: None,
        liquidity_ticker: "SELIC".to_string(),
    };
    let mut sim = Simulator::new(initial, config)
        .unwrap()
        .with_observer(RecordingObserver::new());
    sim.load_market(market).unwrap();

    let lane_value = |s: &rebal_backtest::SimulationSnapshot, strategy: Strategy| {
        s.lanes
            .iter()
            .find(|l| l.strategy == strategy)
            .map(|l| l.value)
            .unwrap()
    };

    let first = sim.step().unwrap().unwrap().clone();
    assert_eq!(bova_price(&sim), 120.0);
    let second = sim.step().unwrap().unwrap().clone();
    assert_eq!(bova_price(&sim), 120.0);

    // nothing re-priced in month 2: each lane only grew by the contribution
    for strategy in [Strategy::Waterfall, Strategy::Milp] {
        let delta = lane_value(&second, strategy) - lane_value(&first, strategy);
        assert!((delta - 500.0).abs() < 1e-6, "{strategy:?}: {delta}");
    }
    let held = &sim.portfolio(Strategy::Waterfall).unwrap().holdings[1];
    assert!((held.value - held.quantity * 120.0).abs() < 1e-6);

    sim.step().unwrap();
    assert_eq!(bova_price(&sim), 150.0);
    assert!(sim.observer().stale_tickers(2).is_empty());
}
