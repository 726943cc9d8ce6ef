//! Out-of-band packet metadata.
//!
//! Tags carry simulation bookkeeping (a transmit timestamp, a flow id) with a
//! packet without occupying any of its bytes. Tags are immutable once
//! attached and are shared between copies of a packet through `Rc`.
//!
//! - Byte tags cover a byte range measured from the packet start. Adding a
//!   header shifts every range; removing bytes clips ranges and drops tags
//!   left with no bytes. Fragments keep the tags that overlap them, clipped
//!   to the fragment.
//! - Packet tags describe the whole packet; at most one per type.

use std::{
    any::{type_name, Any, TypeId},
    fmt,
    ops::Range,
    rc::Rc,
};

#[derive(Clone)]
struct ByteTagEntry {
    type_id: TypeId,
    type_name: &'static str,
    range: Range<usize>,
    tag: Rc<dyn Any>,
}

/// Byte tags of one packet, in the order they were attached.
#[derive(Clone, Default)]
pub struct ByteTagList {
    entries: Vec<ByteTagEntry>,
}

impl ByteTagList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the list holds no tags.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attaches `tag` to `range`. The caller has checked the range.
    pub(crate) fn add<T: Any>(&mut self, tag: T, range: Range<usize>) {
        self.entries.push(ByteTagEntry {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            range,
            tag: Rc::new(tag),
        });
    }

    /// Tags of type `T` with their ranges.
    pub fn iter<T: Any>(&self) -> impl Iterator<Item = (Range<usize>, &T)> + '_ {
        self.entries
            .iter()
            .filter(|entry| entry.type_id == TypeId::of::<T>())
            .filter_map(|entry| {
                entry
                    .tag
                    .downcast_ref::<T>()
                    .map(|tag| (entry.range.clone(), tag))
            })
    }

    /// Drops every tag.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Bytes were added in front of the packet.
    pub(crate) fn shift_right(&mut self, n: usize) {
        for entry in &mut self.entries {
            entry.range = entry.range.start + n..entry.range.end + n;
        }
    }

    /// Keeps the part of every range inside `window` and rebases it to the
    /// window start. Tags with nothing left are dropped.
    pub(crate) fn clip(&mut self, window: Range<usize>) {
        self.entries.retain_mut(|entry| {
            let start = entry.range.start.max(window.start);
            let end = entry.range.end.min(window.end);
            if start >= end {
                return false;
            }
            entry.range = start - window.start..end - window.start;
            true
        });
    }

    /// A copy holding only what falls inside `window`, rebased to it.
    pub(crate) fn fragment(&self, window: Range<usize>) -> Self {
        let mut fragment = self.clone();
        fragment.clip(window);
        fragment
    }

    /// Appends the tags of a packet placed `offset` bytes from the start.
    pub(crate) fn append(&mut self, other: &ByteTagList, offset: usize) {
        self.entries.extend(other.entries.iter().map(|entry| ByteTagEntry {
            range: entry.range.start + offset..entry.range.end + offset,
            ..entry.clone()
        }));
    }
}

impl fmt::Debug for ByteTagList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|entry| (entry.type_name, entry.range.clone())),
            )
            .finish()
    }
}

#[derive(Clone)]
struct PacketTagEntry {
    type_id: TypeId,
    type_name: &'static str,
    tag: Rc<dyn Any>,
}

/// Packet tags of one packet, at most one per type.
#[derive(Clone, Default)]
pub struct PacketTagList {
    entries: Vec<PacketTagEntry>,
}

impl PacketTagList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the list holds no tags.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position<T: Any>(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.type_id == TypeId::of::<T>())
    }

    /// Attaches `tag` unless a tag of the same type is present.
    ///
    /// Returns `false`, leaving the existing tag in place, on a duplicate.
    pub fn add<T: Any>(&mut self, tag: T) -> bool {
        if self.position::<T>().is_some() {
            return false;
        }
        self.entries.push(PacketTagEntry {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            tag: Rc::new(tag),
        });
        true
    }

    /// The tag of type `T`, if any.
    pub fn peek<T: Any>(&self) -> Option<&T> {
        self.position::<T>()
            .and_then(|index| self.entries[index].tag.downcast_ref::<T>())
    }

    /// Detaches and returns the tag of type `T`, if any.
    ///
    /// The value is cloned only when a copy of the packet still shares it.
    pub fn remove<T: Any + Clone>(&mut self) -> Option<T> {
        let index = self.position::<T>()?;
        let entry = self.entries.remove(index);
        let tag = entry.tag.downcast::<T>().ok()?;
        Some(Rc::try_unwrap(tag).unwrap_or_else(|shared| T::clone(&shared)))
    }

    /// Attaches `tag`, returning the tag of the same type it replaced.
    pub fn replace<T: Any + Clone>(&mut self, tag: T) -> Option<T> {
        let previous = self.remove::<T>();
        self.add(tag);
        previous
    }

    /// Drops every tag.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for PacketTagList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.type_name))
            .finish()
    }
}
