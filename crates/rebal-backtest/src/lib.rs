//! rebal-backtest
//!
//! Monthly contribution backtest over two portfolio copies.
//!
//! Pipeline per month: PRICES -> ALLOCATE -> APPLY -> SWEEP -> SNAPSHOT
//!
//! - Deterministic (same portfolio + market snapshot => identical report)
//! - Stale prices are kept, never an error
//! - A failing optimizing allocator falls back to the waterfall for one month
//! - Diagnostics go through `SimulationObserver`, never straight to a logger

pub mod calendar;
mod engine;
pub mod loader;
pub mod observer;
pub mod types;

pub use calendar::{data_window, step_dates};
pub use engine::{simulate, SimulationError, SimulationState, Simulator};
pub use loader::{
    load_positions_file, normalize_target_weights, parse_positions, LoadError, LoaderOptions,
    PurchasePolicy,
};
pub use observer::{
    NoopObserver, RecordingObserver, SimulationEvent, SimulationObserver, TracingObserver,
};
pub use types::{
    ContributionLedgerEntry, LaneSnapshot, LedgerKind, SimulationConfig, SimulationReport,
    SimulationSnapshot,
};
