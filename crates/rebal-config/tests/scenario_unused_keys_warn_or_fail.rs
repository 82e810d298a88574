//! Scenario: unused config keys.
//!
//! GREEN when:
//! 1) Unused keys are detected in WARN mode but do not error.
//! 2) Unused keys cause failure in FAIL mode.
//! 3) Keys under consumed prefixes are not flagged.
//! 4) The allocate mode flags backtest-only sections.
//! 5) Unused pointers come back sorted.

use rebal_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigMode, UnusedKeyPolicy};

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = r#"
contribution:
  amount: 1000
unused_section:
  foo: 123
  bar: 456
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(
        ConfigMode::Backtest,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .expect("warn mode must not error");

    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/unused_section/bar".to_string(),
            "/unused_section/foo".to_string()
        ]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = r#"
contribution:
  amount: 1000
contributon:
  amount: 2000
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let result = report_unused_keys(
        ConfigMode::Allocate,
        &loaded.config_json,
        UnusedKeyPolicy::Fail,
    );

    let msg = format!("{:?}", result.err().unwrap());
    assert!(msg.contains("CONFIG_UNUSED_KEYS"));
    assert!(msg.contains("/contributon/amount"));
}

#[test]
fn consumed_prefix_covers_nested_keys() {
    let yaml = r#"
market:
  series:
    overrides:
      XPML11:
        type: market
        symbol: XPML11.SA
backtest:
  months: 12
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(
        ConfigMode::Backtest,
        &loaded.config_json,
        UnusedKeyPolicy::Fail,
    )
    .unwrap();
    assert!(report.is_clean());
}

#[test]
fn allocate_mode_does_not_read_backtest_sections() {
    let yaml = r#"
contribution:
  amount: 1000
backtest:
  months: 12
market:
  fx_symbol: USDBRL
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(
        ConfigMode::Allocate,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .unwrap();
    assert_eq!(report.mode, "ALLOCATE");
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/backtest/months".to_string(), "/market/fx_symbol".to_string()]
    );
}
