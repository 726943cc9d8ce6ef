//! Identifiers shared between the scheduler and the models it drives.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies the simulated node (or other execution context) an event runs on.
///
/// Events inherit the context of the event that scheduled them unless one is
/// given explicitly. Setup code running before the first event has
/// [`ContextId::NONE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(u32);

impl ContextId {
    /// The context of code that is not running on behalf of any node.
    pub const NONE: ContextId = ContextId(u32::MAX);

    /// Create a context id, typically a node index.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw id.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns `true` for [`ContextId::NONE`].
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for ContextId {
    fn default() -> Self {
        ContextId::NONE
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("-")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Weak handle to a scheduled event.
///
/// Holding an `EventId` grants lookup and cancellation only; the scheduler
/// owns the event itself. The handle stays valid (and reports the event as
/// expired) after the event ran or was cancelled, even once its storage slot
/// has been reused. It also records which scheduler issued it, so a handle
/// cannot act on another scheduler's events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId {
    uid: u64,
    owner: u64,
    slot: u32,
}

impl EventId {
    /// Build a handle from the issuing scheduler, a sequence number and an
    /// arena slot.
    ///
    /// Only schedulers create event ids; models receive them from `schedule`.
    pub const fn new(owner: u64, uid: u64, slot: u32) -> Self {
        Self { uid, owner, slot }
    }

    /// The unique, strictly increasing sequence number of the event.
    pub const fn uid(self) -> u64 {
        self.uid
    }

    /// Identity of the scheduler that issued this handle.
    pub const fn owner(self) -> u64 {
        self.owner
    }

    /// The arena slot the event occupied when it was scheduled.
    pub const fn slot(self) -> u32 {
        self.slot
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_defaults_to_none() {
        assert!(ContextId::default().is_none());
        assert_eq!(ContextId::new(4).get(), 4);
        assert_eq!(ContextId::NONE.to_string(), "-");
        assert_eq!(ContextId::new(7).to_string(), "7");
    }

    #[test]
    fn event_ids_order_by_uid() {
        let a = EventId::new(3, 1, 9);
        let b = EventId::new(3, 2, 0);
        assert!(a < b);
        assert_eq!(b.to_string(), "event#2");
        assert_eq!(b.owner(), 3);
        assert_ne!(EventId::new(3, 2, 0), EventId::new(4, 2, 0));
    }
}
