//! rebal-artifacts
//!
//! Run directory layout:
//!
//! ```text
//! <output>/<run_id>/
//!   manifest.json
//!   allocation_waterfall.csv     (allocate)
//!   allocation_milp.csv          (allocate, when the solver found a plan)
//!   backtest_results.csv         (backtest)
//!   allocation_history.csv       (backtest)
//! ```
//!
//! The manifest is rewritten after every artifact so that it always lists
//! exactly the files present.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

mod allocation;
mod backtest;

pub use allocation::{allocation_file_name, render_plan, write_allocation_csv};
pub use backtest::{write_allocation_history_csv, write_backtest_results_csv};

pub const MANIFEST_SCHEMA_VERSION: i32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: i32,
    pub run_id: Uuid,
    /// `allocate` or `backtest`.
    pub command: String,
    pub config_hash: String,
    pub created_at_utc: DateTime<Utc>,
    /// File names relative to the run directory, in write order.
    pub artifacts: Vec<String>,
}

pub struct InitRunArgs<'a> {
    pub output_root: &'a Path,
    pub run_id: Uuid,
    pub command: &'a str,
    pub config_hash: &'a str,
}

/// An open run directory.
#[derive(Debug, Clone)]
pub struct RunDir {
    pub run_dir: PathBuf,
    pub manifest: RunManifest,
}

impl RunDir {
    /// Create `<output_root>/<run_id>/` and write the initial manifest.
    pub fn init(args: InitRunArgs<'_>) -> Result<Self> {
        let run_dir = args.output_root.join(args.run_id.to_string());
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("create run dir failed: {}", run_dir.display()))?;

        let run = Self {
            run_dir,
            manifest: RunManifest {
                schema_version: MANIFEST_SCHEMA_VERSION,
                run_id: args.run_id,
                command: args.command.to_string(),
                config_hash: args.config_hash.to_string(),
                created_at_utc: Utc::now(),
                artifacts: Vec::new(),
            },
        };
        run.write_manifest()?;
        Ok(run)
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.run_dir.join(file_name)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path(MANIFEST_FILE)
    }

    /// Register `file_name` as written and rewrite the manifest.
    pub fn record(&mut self, file_name: &str) -> Result<()> {
        if !self.manifest.artifacts.iter().any(|a| a == file_name) {
            self.manifest.artifacts.push(file_name.to_string());
        }
        self.write_manifest()
    }

    fn write_manifest(&self) -> Result<()> {
        let path = self.manifest_path();
        let json =
            serde_json::to_string_pretty(&self.manifest).context("serialize manifest failed")?;
        fs::write(&path, format!("{json}\n"))
            .with_context(|| format!("write manifest failed: {}", path.display()))
    }
}

pub fn read_manifest(run_dir: &Path) -> Result<RunManifest> {
    let path = run_dir.join(MANIFEST_FILE);
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("read manifest failed: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse manifest failed: {}", path.display()))
}
