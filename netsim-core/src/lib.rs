//! # netsim-core
//!
//! Core types for the netsim discrete-event network simulation kernel.
//!
//! This crate holds the vocabulary every other netsim crate shares:
//!
//! - [`Time`], [`TimeUnit`] and [`Resolution`]: virtual time
//! - [`ContextId`] and [`EventId`]: identifiers handed out by the scheduler
//! - [`SimulationError`]: the error type event actions return

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod error;
mod time;
mod types;

pub use error::{SimulationError, SimulationResult};
pub use time::{Resolution, Time, TimeError, TimeUnit};
pub use types::{ContextId, EventId};
