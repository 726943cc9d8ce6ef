//! # Simulator Configuration
//!
//! Run-wide settings fixed when a [`Simulator`](crate::Simulator) is created.
//!
//! | Setting | Field | Default | Effect |
//! |---------|-------|---------|--------|
//! | Resolution | `resolution` | `ns` | Granularity of every scheduled timestamp |
//! | Seed | `seed` | `0` | Seed of the simulator's [`SimRng`](crate::SimRng) |
//! | Stop time | `stop_time` | none | `run` stops once simulated time reaches it |
//! | Event limit | `max_events` | none | `run` stops after this many events |
//!
//! The configuration is serde-deserializable; times are written in their
//! string form:
//!
//! ```
//! use netsim_sim::SimulatorConfig;
//! use netsim_core::{Time, TimeUnit};
//!
//! let config: SimulatorConfig =
//!     serde_json::from_str(r#"{ "resolution": "us", "stop_time": "10s" }"#).unwrap();
//! assert_eq!(config.resolution.unit(), TimeUnit::Micros);
//! assert_eq!(config.stop_time, Some(Time::from_secs(10)));
//! assert_eq!(config.seed, 0);
//! ```

use serde::{Deserialize, Serialize};

use netsim_core::{Resolution, SimulationError, SimulationResult, Time, TimeUnit};

/// Settings for one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Duration of one raw tick. Delays are truncated to whole ticks.
    pub resolution: Resolution,

    /// Seed for the simulator's random number generator.
    pub seed: u64,

    /// Absolute time at which `run` stops, if any.
    pub stop_time: Option<Time>,

    /// Maximum number of events `run` executes before stopping, if any.
    ///
    /// Guards against models that reschedule themselves forever.
    pub max_events: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            seed: 0,
            stop_time: None,
            max_events: None,
        }
    }
}

impl SimulatorConfig {
    /// Default configuration: nanosecond resolution, seed 0, no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tick resolution.
    pub fn with_resolution(mut self, unit: TimeUnit) -> Self {
        self.resolution = Resolution::new(unit);
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Stops runs at `time`.
    pub fn with_stop_time(mut self, time: Time) -> Self {
        self.stop_time = Some(time);
        self
    }

    /// Stops runs after `max_events` events.
    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = Some(max_events);
        self
    }

    /// Checks the configuration for values no run could honour.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidConfig`] for a negative stop time or
    /// an event limit of zero.
    pub fn validate(&self) -> SimulationResult<()> {
        if let Some(stop) = self.stop_time {
            if stop.is_negative() {
                return Err(SimulationError::InvalidConfig(format!(
                    "stop_time {stop} is negative"
                )));
            }
        }
        if self.max_events == Some(0) {
            return Err(SimulationError::InvalidConfig(
                "max_events must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
