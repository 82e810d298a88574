//! Scenario: positions file + CSV market directory, six months.
//!
//! GREEN when:
//! - the fixture loads with percent weights normalized and IMAB11 whole-unit
//! - the market is fetched over the simulator's own data window
//! - tickers without a file keep their price and are listed as skipped
//! - US holdings are priced in local currency (USD × FX)
//! - invested capital grows by exactly one contribution per month

use std::fs;
use std::time::Duration;

use chrono::NaiveDate;
use rebal_backtest::{load_positions_file, LoaderOptions, SimulationConfig, Simulator};
use rebal_md::{CsvSeriesProvider, RetryPolicy, SeriesMap};
use rebal_portfolio::{PurchaseUnit, Strategy};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

const MONTH_ENDS: [&str; 6] = [
    "2023-12-29",
    "2024-01-31",
    "2024-02-29",
    "2024-03-28",
    "2024-04-30",
    "2024-05-31",
];

fn series(values: [f64; 6]) -> String {
    let mut s = String::from("date,value\n");
    for (date, v) in MONTH_ENDS.iter().zip(values) {
        s.push_str(&format!("{date},{v}\n"));
    }
    s
}

#[test]
fn scenario_fixture_portfolio_runs_six_months() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/positions.csv");
    let initial = load_positions_file(path, &LoaderOptions::default()).unwrap();
    assert_eq!(initial.len(), 6);
    assert!((initial.total_target_weight() - 1.0).abs() < 1e-12);
    assert_eq!(initial.holdings[0].unit, PurchaseUnit::Continuous);
    assert_eq!(initial.holdings[2].unit, PurchaseUnit::Whole);
    let initial_value = initial.total_value();

    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("USDBRL.csv"),
        series([4.9, 4.95, 5.0, 5.0, 5.05, 5.1]),
    )
    .unwrap();
    fs::write(
        dir.path().join("VOO.csv"),
        series([440.0, 445.0, 450.0, 460.0, 455.0, 470.0]),
    )
    .unwrap();
    fs::write(
        dir.path().join("BOVA11.SA.csv"),
        series([121.0, 119.5, 123.0, 125.0, 122.0, 124.5]),
    )
    .unwrap();
    fs::write(
        dir.path().join("4390.csv"),
        series([0.04, 0.04, 0.041, 0.041, 0.04, 0.039]),
    )
    .unwrap();

    let config = SimulationConfig {
        contribution: 3000.0,
        months: 6,
        end_date: d(2024, 6, 1),
        min_selected: None,
        liquidity_ticker: "SELIC".to_string(),
    };
    let mut sim = Simulator::new(initial, config).unwrap();
    assert_eq!(sim.data_window(), (d(2023, 12, 1), d(2024, 6, 1)));
    sim.fetch_market(
        &CsvSeriesProvider::new(dir.path()),
        &SeriesMap::default(),
        "USDBRL",
        RetryPolicy::new(1, Duration::ZERO),
    )
    .unwrap();
    let report = sim.run().unwrap();

    assert_eq!(report.snapshots.len(), 6);
    for s in &report.snapshots {
        assert_eq!(s.invested, initial_value + s.month as f64 * 3000.0);
    }

    for strategy in [Strategy::Waterfall, Strategy::Milp] {
        let pf = report.portfolio(strategy).unwrap();
        let voo = &pf.holdings[pf.position_of("VOO").unwrap()];
        assert!((voo.price - 470.0 * 5.1).abs() < 1e-9);
        // no file for these: initial prices are kept
        let imab = &pf.holdings[pf.position_of("IMAB11").unwrap()];
        assert_eq!(imab.price, 85.0);
        let smal = &pf.holdings[pf.position_of("SMAL11").unwrap()];
        assert_eq!(smal.price, 95.0);
        // whole-unit rows only ever hold whole units
        for h in pf.holdings.iter().filter(|h| h.unit == PurchaseUnit::Whole) {
            assert_eq!(h.quantity.fract(), 0.0, "{}", h.ticker());
        }
    }
}
