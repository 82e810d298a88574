//! Simulation diagnostics hooks.
//!
//! The engine reports notable events through [`SimulationObserver`] and never
//! logs on its own. [`TracingObserver`] forwards them to `tracing`;
//! [`RecordingObserver`] keeps them in memory.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use rebal_portfolio::{AllocationError, Strategy};

use crate::types::SimulationSnapshot;

pub trait SimulationObserver {
    fn on_month_start(&mut self, _month: usize, _date: NaiveDate) {}

    /// A ticker has a series but no observation on or before `date`; its
    /// previous price is kept.
    fn on_stale_price(&mut self, _month: usize, _date: NaiveDate, _ticker: &str) {}

    /// The lane's allocator failed and the waterfall plan was used instead.
    fn on_fallback(&mut self, _month: usize, _lane: Strategy, _error: &AllocationError) {}

    fn on_sweep(&mut self, _month: usize, _lane: Strategy, _ticker: &str, _amount: f64) {}

    fn on_snapshot(&mut self, _snapshot: &SimulationSnapshot) {}
}

impl<O: SimulationObserver + ?Sized> SimulationObserver for &mut O {
    fn on_month_start(&mut self, month: usize, date: NaiveDate) {
        (**self).on_month_start(month, date)
    }

    fn on_stale_price(&mut self, month: usize, date: NaiveDate, ticker: &str) {
        (**self).on_stale_price(month, date, ticker)
    }

    fn on_fallback(&mut self, month: usize, lane: Strategy, error: &AllocationError) {
        (**self).on_fallback(month, lane, error)
    }

    fn on_sweep(&mut self, month: usize, lane: Strategy, ticker: &str, amount: f64) {
        (**self).on_sweep(month, lane, ticker, amount)
    }

    fn on_snapshot(&mut self, snapshot: &SimulationSnapshot) {
        (**self).on_snapshot(snapshot)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SimulationObserver for NoopObserver {}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SimulationObserver for TracingObserver {
    fn on_month_start(&mut self, month: usize, date: NaiveDate) {
        debug!(month, %date, "month start");
    }

    fn on_stale_price(&mut self, month: usize, date: NaiveDate, ticker: &str) {
        warn!(month, %date, ticker, "no observation on or before date; keeping previous price");
    }

    fn on_fallback(&mut self, month: usize, lane: Strategy, error: &AllocationError) {
        warn!(month, lane = %lane, error = %error, "allocator failed; using waterfall this month");
    }

    fn on_sweep(&mut self, month: usize, lane: Strategy, ticker: &str, amount: f64) {
        debug!(month, lane = %lane, ticker, amount, "leftover swept");
    }

    fn on_snapshot(&mut self, snapshot: &SimulationSnapshot) {
        for lane in &snapshot.lanes {
            info!(
                month = snapshot.month,
                date = %snapshot.date,
                lane = %lane.strategy,
                value = lane.value,
                invested = snapshot.invested,
                return_pct = lane.corrected_return * 100.0,
                "month closed"
            );
        }
    }
}

/// One observed event.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    MonthStart { month: usize, date: NaiveDate },
    StalePrice { month: usize, ticker: String },
    Fallback { month: usize, lane: Strategy, error: AllocationError },
    Sweep { month: usize, lane: Strategy, ticker: String, amount: f64 },
    Snapshot { month: usize },
}

#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub events: Vec<SimulationEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stale_tickers(&self, month: usize) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SimulationEvent::StalePrice { month: m, ticker } if *m == month => {
                    Some(ticker.as_str())
                }
                _ => None,
            })
            .collect()
    }

    pub fn fallbacks(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SimulationEvent::Fallback { .. }))
            .count()
    }
}

impl SimulationObserver for RecordingObserver {
    fn on_month_start(&mut self, month: usize, date: NaiveDate) {
        self.events.push(SimulationEvent::MonthStart { month, date });
    }

    fn on_stale_price(&mut self, month: usize, _date: NaiveDate, ticker: &str) {
        self.events.push(SimulationEvent::StalePrice {
            month,
            ticker: ticker.to_string(),
        });
    }

    fn on_fallback(&mut self, month: usize, lane: Strategy, error: &AllocationError) {
        self.events.push(SimulationEvent::Fallback {
            month,
            lane,
            error: error.clone(),
        });
    }

    fn on_sweep(&mut self, month: usize, lane: Strategy, ticker: &str, amount: f64) {
        self.events.push(SimulationEvent::Sweep {
            month,
            lane,
            ticker: ticker.to_string(),
            amount,
        });
    }

    fn on_snapshot(&mut self, snapshot: &SimulationSnapshot) {
        self.events.push(SimulationEvent::Snapshot {
            month: snapshot.month,
        });
    }
}
