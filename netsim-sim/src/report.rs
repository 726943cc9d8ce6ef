//! Simulation metrics and reporting.
//!
//! A [`SimulationReport`] is what drivers read after `run` returns: where the
//! clock ended, why the run stopped and how much work the scheduler did.

use std::fmt;

use netsim_core::Time;

/// Why the run loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No pending events remained.
    QueueEmpty,
    /// `stop`, `stop_at` or the configured stop time ended the run.
    Stopped,
    /// The configured `max_events` limit was reached.
    EventLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::QueueEmpty => f.write_str("event queue empty"),
            StopReason::Stopped => f.write_str("stop requested"),
            StopReason::EventLimit => f.write_str("event limit reached"),
        }
    }
}

/// Counters maintained by the scheduler across its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationMetrics {
    /// Events accepted by `schedule` and its variants.
    pub events_scheduled: u64,
    /// Events whose action ran.
    pub events_executed: u64,
    /// Events cancelled before they ran.
    pub events_cancelled: u64,
    /// Stale heap entries skipped by the run loop.
    pub stale_entries_skipped: u64,
    /// Largest number of simultaneously pending events.
    pub peak_pending: usize,
}

/// Report of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    /// Simulated time when the run loop returned.
    pub final_time: Time,
    /// Why the run loop returned, if it has run at all.
    pub stop_reason: Option<StopReason>,
    /// Seed of the simulator's random number generator.
    pub seed: u64,
    /// Events still pending when the report was taken.
    pub pending_events: usize,
    /// Scheduler counters.
    pub metrics: SimulationMetrics,
}

impl SimulationReport {
    /// Fraction of scheduled events that were cancelled, as a percentage.
    pub fn cancellation_rate(&self) -> f64 {
        if self.metrics.events_scheduled == 0 {
            0.0
        } else {
            (self.metrics.events_cancelled as f64 / self.metrics.events_scheduled as f64) * 100.0
        }
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Simulation Report ===")?;
        writeln!(f, "Final time: {}", self.final_time)?;
        match self.stop_reason {
            Some(reason) => writeln!(f, "Stopped: {reason}")?,
            None => writeln!(f, "Stopped: not run")?,
        }
        writeln!(f, "Seed: {}", self.seed)?;
        writeln!(f, "Events scheduled: {}", self.metrics.events_scheduled)?;
        writeln!(f, "Events executed: {}", self.metrics.events_executed)?;
        writeln!(
            f,
            "Events cancelled: {} ({:.2}%)",
            self.metrics.events_cancelled,
            self.cancellation_rate()
        )?;
        writeln!(f, "Events pending: {}", self.pending_events)?;
        writeln!(f, "Peak pending: {}", self.metrics.peak_pending)?;
        Ok(())
    }
}
