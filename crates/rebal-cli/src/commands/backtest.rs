//! `rebal backtest`: fetch market data, simulate, export.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use rebal_artifacts::{
    write_allocation_history_csv, write_backtest_results_csv, InitRunArgs, RunDir,
};
use rebal_backtest::{SimulationConfig, Simulator, TracingObserver};
use rebal_config::{ConfigMode, PricesProvider, RatesProvider, RebalConfig, UnusedKeyPolicy};
use rebal_md::{
    ChartProvider, CompositeProvider, CsvSeriesProvider, SeriesProvider, SgsProvider,
};

use super::{load_config, load_portfolio};

fn build_provider(cfg: &RebalConfig) -> Result<CompositeProvider> {
    let prices: Box<dyn SeriesProvider> = match cfg.market.prices {
        PricesProvider::Csv => Box::new(CsvSeriesProvider::new(&cfg.market.data_dir)),
        PricesProvider::Chart => {
            let chart = match &cfg.market.chart_base_url {
                Some(url) => ChartProvider::with_base_url(url.clone()),
                None => ChartProvider::new(),
            }
            .context("build chart client failed")?;
            Box::new(chart)
        }
    };
    let rates: Box<dyn SeriesProvider> = match cfg.market.rates {
        RatesProvider::Csv => Box::new(CsvSeriesProvider::new(&cfg.market.data_dir)),
        RatesProvider::Sgs => {
            let sgs = match &cfg.market.sgs_base_url {
                Some(url) => SgsProvider::with_base_url(url.clone()),
                None => SgsProvider::new(),
            }
            .context("build SGS client failed")?;
            Box::new(sgs)
        }
    };
    Ok(CompositeProvider::new(rates, prices))
}

pub fn run_backtest(config_paths: &[String], policy: UnusedKeyPolicy) -> Result<()> {
    let (loaded, cfg) = load_config(config_paths, ConfigMode::Backtest, policy)?;
    let portfolio = load_portfolio(&cfg)?;

    let sim_config = SimulationConfig {
        contribution: cfg.contribution.amount,
        months: cfg.backtest.months,
        end_date: cfg.backtest.end_date_or(Utc::now().date_naive()),
        min_selected: cfg.contribution.min_selected,
        liquidity_ticker: cfg.portfolio.liquidity_ticker.clone(),
    };
    let mut sim = Simulator::new(portfolio, sim_config)?.with_observer(TracingObserver);

    let (start, end) = sim.data_window();
    info!(%start, %end, months = cfg.backtest.months, "fetching market data");
    let provider = build_provider(&cfg)?;
    sim.fetch_market(
        &provider,
        &cfg.market.series,
        &cfg.market.fx_symbol,
        cfg.market.retry_policy(),
    )?;

    let report = sim.run()?;

    let mut run = RunDir::init(InitRunArgs {
        output_root: Path::new(&cfg.output.dir),
        run_id: Uuid::new_v4(),
        command: "backtest",
        config_hash: &loaded.config_hash,
    })?;
    write_backtest_results_csv(&run.path("backtest_results.csv"), &report)?;
    run.record("backtest_results.csv")?;
    write_allocation_history_csv(&run.path("allocation_history.csv"), &report)?;
    run.record("allocation_history.csv")?;

    if let Some(last) = report.last() {
        println!("months={} invested={:.2}", last.month, last.invested);
        for lane in &last.lanes {
            println!(
                "strategy={} value={:.2} return_pct={:.2} deficit={:.2}",
                lane.strategy,
                lane.value,
                lane.corrected_return * 100.0,
                lane.deficit
            );
        }
    }
    println!("fallback_months={}", report.fallback_months().len());
    println!("run_id={}", run.manifest.run_id);
    println!("run_dir={}", run.run_dir.display());
    Ok(())
}
