//! # netsim
//!
//! Discrete-event network simulation kernel.
//!
//! Protocol models schedule callbacks on a virtual clock and pass packets
//! between layers, pushing and popping headers through a shared codec
//! contract. Simulated time only moves when the scheduler runs the next
//! event, so a run is exactly reproducible.
//!
//! ## Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              netsim (this crate)                        │
//! │   Re-exports everything                                 │
//! ├────────────────────────────┬────────────────────────────┤
//! │  netsim-sim                │  netsim-packet             │
//! │  • Simulator + run loop    │  • Copy-on-write Buffer    │
//! │  • SimulatorConfig         │  • Header / Trailer codecs │
//! │  • SimRng                  │  • Packet, byte/packet tags│
//! │  • Timer, TrickleTimer     │  • PacketError             │
//! ├────────────────────────────┴────────────────────────────┤
//! │                     netsim-core                         │
//! │  Time, TimeUnit, Resolution, EventId, SimulationError   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use std::{cell::RefCell, rc::Rc};
//! use netsim::{Packet, Simulator, Time};
//!
//! let delivered = Rc::new(RefCell::new(Vec::new()));
//! let mut sim = Simulator::new_with_seed(1);
//!
//! // A 2ms link: the receiver sees the packet after the propagation delay
//! let packet = Packet::new(b"ping");
//! let sink = delivered.clone();
//! sim.schedule(Time::from_millis(2), move |sim| {
//!     sink.borrow_mut().push((sim.now(), packet.to_vec()));
//!     Ok(())
//! })?;
//!
//! let report = sim.run()?;
//! assert_eq!(*delivered.borrow(), vec![(Time::from_millis(2), b"ping".to_vec())]);
//! assert_eq!(report.metrics.events_executed, 1);
//! # Ok::<(), netsim::SimulationError>(())
//! ```
//!
//! ## Which Crate to Use
//!
//! | Use case | Crate |
//! |----------|-------|
//! | Everything (recommended) | `netsim` |
//! | Time and error types only | `netsim-core` |
//! | Scheduler without packets | `netsim-sim` |
//! | Packets without a scheduler | `netsim-packet` |

#![deny(missing_docs)]

pub use netsim_core::*;
pub use netsim_packet::*;
pub use netsim_sim::*;
