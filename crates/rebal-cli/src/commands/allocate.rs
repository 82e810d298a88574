//! `rebal allocate`: one contribution, both allocators.

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use rebal_artifacts::{allocation_file_name, render_plan, write_allocation_csv, InitRunArgs, RunDir};
use rebal_config::{ConfigMode, UnusedKeyPolicy};
use rebal_portfolio::{Allocator, MilpAllocator, WaterfallAllocator};

use super::{load_config, load_portfolio};

pub fn run_allocate(config_paths: &[String], policy: UnusedKeyPolicy, export: bool) -> Result<()> {
    let (loaded, cfg) = load_config(config_paths, ConfigMode::Allocate, policy)?;
    let portfolio = load_portfolio(&cfg)?;
    let pv = portfolio.total_value();
    let contribution = cfg.contribution.amount;
    let liquidity = &cfg.portfolio.liquidity_ticker;
    info!(holdings = portfolio.len(), value = pv, contribution, "portfolio loaded");

    let waterfall = WaterfallAllocator::new().allocate(&portfolio, pv, contribution)?;
    print!("{}", render_plan(&waterfall, liquidity));

    let milp = MilpAllocator::with_min_selected(cfg.contribution.min_selected);
    let milp_plan = match milp.allocate(&portfolio, pv, contribution) {
        Ok(plan) => {
            print!("{}", render_plan(&plan, liquidity));
            Some(plan)
        }
        Err(e) => {
            warn!(error = %e, "milp allocator failed");
            println!("\nno allocation found");
            None
        }
    };

    if !export {
        return Ok(());
    }

    let mut run = RunDir::init(InitRunArgs {
        output_root: Path::new(&cfg.output.dir),
        run_id: Uuid::new_v4(),
        command: "allocate",
        config_hash: &loaded.config_hash,
    })?;
    for plan in std::iter::once(&waterfall).chain(milp_plan.as_ref()) {
        let name = allocation_file_name(plan.strategy);
        write_allocation_csv(&run.path(&name), plan)?;
        run.record(&name)?;
    }

    println!();
    println!("run_id={}", run.manifest.run_id);
    println!("run_dir={}", run.run_dir.display());
    Ok(())
}
