//! Core simulation engine.
//!
//! ## Submodules
//!
//! - `world` - The [`Simulator`]: clock, pending events and run loop
//! - `events` - Event keys, the priority queue and the record arena
//! - `rng` - Seeded random number generation owned by a simulator

pub mod events;
pub mod rng;
pub mod world;

pub use events::{Action, EventQueue, ScheduledEvent};
pub use rng::SimRng;
pub use world::Simulator;
