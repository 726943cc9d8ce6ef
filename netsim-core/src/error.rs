//! Error types shared by every netsim crate.

use thiserror::Error;

use crate::time::Time;

/// Errors that abort or reject simulation operations.
///
/// Variants other than [`SimulationError::Model`] describe misuse of the
/// scheduler itself. `Model` carries an error raised by protocol code inside
/// an event action, such as a malformed header.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// An event was scheduled into the past.
    #[error("cannot schedule into the past: delay {delay} is negative")]
    NegativeDelay {
        /// The rejected delay.
        delay: Time,
    },

    /// The run loop was entered from inside an executing event.
    #[error("Simulator::run called re-entrantly from inside an event action")]
    ReentrantRun,

    /// The simulator configuration is unusable.
    #[error("invalid simulator configuration: {0}")]
    InvalidConfig(String),

    /// The simulation is in an invalid state.
    #[error("invalid simulation state: {0}")]
    InvalidState(String),

    /// A protocol model failed while executing an event.
    #[error("model error: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SimulationError {
    /// Wrap an error raised by protocol code.
    pub fn model<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SimulationError::Model(Box::new(err))
    }
}

/// A type alias for `Result<T, SimulationError>`.
pub type SimulationResult<T> = Result<T, SimulationError>;

impl From<crate::time::TimeError> for SimulationError {
    fn from(err: crate::time::TimeError) -> Self {
        SimulationError::InvalidConfig(err.to_string())
    }
}
