//! Scenario: typed config view.
//!
//! GREEN when:
//! - an empty config yields the documented defaults
//! - overlays reach the typed view (amount, k, rate and price providers, overrides)
//! - invalid values are rejected with the offending key in the message

use std::time::Duration;

use chrono::NaiveDate;
use rebal_config::{load_layered_yaml_from_strings, PricesProvider, RatesProvider, RebalConfig};
use rebal_md::SeriesSource;

#[test]
fn empty_config_takes_defaults() {
    let cfg = load_layered_yaml_from_strings(&["{}"]).unwrap().typed().unwrap();
    assert_eq!(cfg, RebalConfig::default());
    assert_eq!(cfg.contribution.amount, 2500.0);
    assert_eq!(cfg.contribution.min_selected, None);
    assert_eq!(cfg.portfolio.delimiter, ';');
    assert_eq!(cfg.portfolio.fixed_income_class, "RF");
    assert_eq!(cfg.portfolio.whole_unit_tickers, vec!["IMAB11".to_string()]);
    assert_eq!(cfg.portfolio.liquidity_ticker, "SELIC");
    assert_eq!(cfg.backtest.months, 24);
    assert_eq!(cfg.market.rates, RatesProvider::Sgs);
    assert_eq!(cfg.market.prices, PricesProvider::Csv);
    assert_eq!(cfg.market.chart_base_url, None);
    assert_eq!(cfg.market.fx_symbol, "USDBRL");
    let retry = cfg.market.retry_policy();
    assert_eq!(retry.attempts, 3);
    assert_eq!(retry.backoff, Duration::from_millis(1000));
    assert_eq!(cfg.output.dir, "runs");
}

#[test]
fn overlays_reach_the_typed_view() {
    let base = r#"
contribution:
  amount: 2500
backtest:
  end_date: 2025-05-01
"#;
    let overlay = r#"
contribution:
  amount: 1800.5
  min_selected: 4
market:
  rates: csv
  prices: chart
  fx_symbol: USDBRL=X
  data_dir: fixtures/market
  series:
    overrides:
      TREASURY:
        type: fixed_annual
        rate: 0.1
"#;
    let cfg = load_layered_yaml_from_strings(&[base, overlay])
        .unwrap()
        .typed()
        .unwrap();
    assert_eq!(cfg.contribution.amount, 1800.5);
    assert_eq!(cfg.contribution.min_selected, Some(4));
    assert_eq!(cfg.market.rates, RatesProvider::Csv);
    assert_eq!(cfg.market.prices, PricesProvider::Chart);
    assert_eq!(cfg.market.fx_symbol, "USDBRL=X");
    assert_eq!(cfg.market.data_dir, "fixtures/market");
    let today = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
    assert_eq!(
        cfg.backtest.end_date_or(today),
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    );
    assert_eq!(
        cfg.market.series.resolve("TREASURY", "BR"),
        SeriesSource::FixedAnnual { rate: 0.1 }
    );
    // untouched defaults survive
    assert_eq!(cfg.market.series.br_suffix, ".SA");
    assert_eq!(cfg.backtest.months, 24);
}

#[test]
fn invalid_values_are_rejected() {
    let bad_months = load_layered_yaml_from_strings(&["backtest:\n  months: 0\n"]).unwrap();
    let err = bad_months.typed().unwrap_err();
    assert!(err.to_string().contains("backtest.months"), "{err}");

    let bad_amount = load_layered_yaml_from_strings(&["contribution:\n  amount: -5\n"]).unwrap();
    let err = bad_amount.typed().unwrap_err();
    assert!(err.to_string().contains("contribution.amount"), "{err}");

    let bad_shape = load_layered_yaml_from_strings(&["market:\n  rates: carrier-pigeon\n"]).unwrap();
    assert!(bad_shape.typed().is_err());
}
