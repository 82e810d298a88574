use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;

use rebal_config::UnusedKeyPolicy;

#[derive(Parser)]
#[command(name = "rebal")]
#[command(about = "Contribution rebalancer and two-strategy backtest", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnusedKeys {
    Warn,
    Fail,
}

impl From<UnusedKeys> for UnusedKeyPolicy {
    fn from(v: UnusedKeys) -> Self {
        match v {
            UnusedKeys::Warn => UnusedKeyPolicy::Warn,
            UnusedKeys::Fail => UnusedKeyPolicy::Fail,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Split one contribution with the waterfall and the MILP allocators
    Allocate {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// What to do with config keys this command does not read
        #[arg(long = "unused-keys", value_enum, default_value = "warn")]
        unused_keys: UnusedKeys,

        /// Print only; do not create a run directory
        #[arg(long, default_value_t = false)]
        no_export: bool,
    },

    /// Simulate monthly contributions for both allocators side by side
    Backtest {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long = "unused-keys", value_enum, default_value = "warn")]
        unused_keys: UnusedKeys,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Silent when the files do not exist.
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Allocate {
            config_paths,
            unused_keys,
            no_export,
        } => commands::allocate::run_allocate(&config_paths, unused_keys.into(), !no_export),

        Commands::Backtest {
            config_paths,
            unused_keys,
        } => commands::backtest::run_backtest(&config_paths, unused_keys.into()),

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = rebal_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
