//! Command handler modules for the `rebal` CLI.
//!
//! Shared config and portfolio loading lives here.

pub mod allocate;
pub mod backtest;

use anyhow::{Context, Result};
use tracing::warn;

use rebal_backtest::{load_positions_file, LoaderOptions, PurchasePolicy};
use rebal_config::{
    load_layered_yaml, report_unused_keys, ConfigMode, LoadedConfig, RebalConfig, UnusedKeyPolicy,
};
use rebal_portfolio::Portfolio;

/// Load the layered config, check unused keys for `mode`, and build the
/// typed view.
pub fn load_config(
    paths: &[String],
    mode: ConfigMode,
    policy: UnusedKeyPolicy,
) -> Result<(LoadedConfig, RebalConfig)> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&path_refs)?;

    let report = report_unused_keys(mode, &loaded.config_json, policy)?;
    for p in &report.unused_leaf_pointers {
        warn!(mode = %report.mode, key = %p, "config key is not read by this command");
    }

    let cfg = loaded.typed()?;
    Ok((loaded, cfg))
}

pub fn loader_options(cfg: &RebalConfig) -> LoaderOptions {
    LoaderOptions {
        // validated as ASCII by RebalConfig::validate
        delimiter: cfg.portfolio.delimiter as u8,
        policy: PurchasePolicy {
            fixed_income_class: cfg.portfolio.fixed_income_class.clone(),
            whole_unit_tickers: cfg.portfolio.whole_unit_tickers.clone(),
        },
    }
}

pub fn load_portfolio(cfg: &RebalConfig) -> Result<Portfolio> {
    let path = &cfg.portfolio.positions;
    let pf = load_positions_file(path, &loader_options(cfg))
        .with_context(|| format!("load positions failed: {path}"))?;
    let weights = pf.total_target_weight();
    if (weights - 1.0).abs() > 1e-6 {
        warn!(total = weights, "target weights do not add up to 1");
    }
    Ok(pf)
}
