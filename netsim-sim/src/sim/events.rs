//! Event records and the time-ordered queue that holds them.
//!
//! Pending events live in two places:
//!
//! - [`EventQueue`]: a binary heap of `(time, sequence, slot)` keys
//! - [`EventSlab`]: a flat arena of [`EventRecord`]s addressed by slot
//!
//! Cancelling an event removes its record from the arena and frees the slot
//! immediately, but leaves its key in the heap. When the key is eventually
//! popped, its sequence number no longer matches the slot's occupant and the
//! key is skipped. This keeps cancellation O(1) at the cost of a few stale
//! heap entries.

use std::{cmp::Ordering, collections::BinaryHeap, fmt};

use netsim_core::{ContextId, SimulationResult, Time};

use super::world::Simulator;

/// The work an event performs when it fires.
pub type Action = Box<dyn FnOnce(&mut Simulator) -> SimulationResult<()>>;

/// Heap key for an event scheduled at a specific simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledEvent {
    time: Time,
    sequence: u64, // For deterministic ordering
    slot: u32,
}

impl ScheduledEvent {
    /// Creates a new heap key.
    pub fn new(time: Time, sequence: u64, slot: u32) -> Self {
        Self {
            time,
            sequence,
            slot,
        }
    }

    /// Returns the scheduled execution time.
    pub fn time(&self) -> Time {
        self.time
    }

    /// Returns the sequence number assigned when the event was scheduled.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the arena slot holding the event record.
    pub fn slot(&self) -> u32 {
        self.slot
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max heap, but we want earliest time first
        // So we reverse the time comparison
        match other.time.cmp(&self.time) {
            // Same time: earlier sequence first (also reversed for max heap)
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            other => other,
        }
    }
}

/// A priority queue of event keys in chronological order.
///
/// Keys at equal times pop in sequence order, which makes runs with the same
/// scheduling history bit-for-bit reproducible.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledEvent>,
}

impl EventQueue {
    /// Creates a new empty event queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Adds a key to the queue.
    pub fn schedule(&mut self, event: ScheduledEvent) {
        self.heap.push(event);
    }

    /// Removes and returns the earliest key.
    pub fn pop_earliest(&mut self) -> Option<ScheduledEvent> {
        self.heap.pop()
    }

    /// Returns the earliest key without removing it.
    pub fn peek_earliest(&self) -> Option<&ScheduledEvent> {
        self.heap.peek()
    }

    /// Returns `true` if the queue holds no keys, stale or live.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of keys in the queue, including stale ones.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Drops every key.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

/// A pending event owned by the scheduler.
pub struct EventRecord {
    pub(crate) uid: u64,
    pub(crate) time: Time,
    pub(crate) context: ContextId,
    pub(crate) action: Action,
}

impl fmt::Debug for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecord")
            .field("uid", &self.uid)
            .field("time", &self.time)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Arena of pending event records with slot reuse.
#[derive(Debug, Default)]
pub struct EventSlab {
    slots: Vec<Option<EventRecord>>,
    free: Vec<u32>,
    live: usize,
}

impl EventSlab {
    /// Stores a record and returns its slot.
    pub(crate) fn insert(&mut self, record: EventRecord) -> u32 {
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(record);
                slot
            }
            None => {
                self.slots.push(Some(record));
                (self.slots.len() - 1) as u32
            }
        }
    }

    /// Returns the record in `slot` if it is still the event numbered `uid`.
    pub(crate) fn get(&self, slot: u32, uid: u64) -> Option<&EventRecord> {
        self.slots
            .get(slot as usize)
            .and_then(Option::as_ref)
            .filter(|record| record.uid == uid)
    }

    /// Removes and returns the record in `slot` if it is still the event numbered `uid`.
    pub(crate) fn take(&mut self, slot: u32, uid: u64) -> Option<EventRecord> {
        let entry = self.slots.get_mut(slot as usize)?;
        if entry.as_ref().is_some_and(|record| record.uid == uid) {
            self.free.push(slot);
            self.live -= 1;
            entry.take()
        } else {
            None
        }
    }

    /// Number of slots ever allocated.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of pending records.
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Drops every record.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}
