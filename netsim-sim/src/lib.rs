//! # netsim-sim
//!
//! Discrete-event scheduler for the netsim kernel.
//!
//! A [`Simulator`] owns a virtual clock and a queue of pending events. Events
//! are closures that run at a scheduled simulated time, strictly ordered by
//! `(time, insertion order)`. Running a simulation advances the clock from
//! event to event; nothing happens between events.
//!
//! ## Core Components
//!
//! - [`Simulator`]: clock, scheduling, cancellation and the run loop
//! - [`SimulatorConfig`]: resolution, seed, stop time and event limit
//! - [`SimRng`]: deterministic randomness, one generator per simulator
//! - [`Timer`]: restartable one-shot timer with suspend/resume
//! - [`TrickleTimer`]: RFC 6206 adaptive timer
//! - [`SimulationReport`]: what happened during a run
//!
//! ## Determinism
//!
//! A run is fully determined by its configuration (including the seed) and
//! the order in which the driver schedules events. There is no wall clock and
//! no global state: two simulators in one process never interfere.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod report;
pub mod sim;
pub mod timer;
pub mod trickle;

pub use config::SimulatorConfig;
pub use report::{SimulationMetrics, SimulationReport, StopReason};
pub use sim::{Action, EventQueue, ScheduledEvent, SimRng, Simulator};
pub use timer::{Timer, TimerCallback, TimerState};
pub use trickle::TrickleTimer;

pub use netsim_core::{
    ContextId, EventId, Resolution, SimulationError, SimulationResult, Time, TimeError, TimeUnit,
};
