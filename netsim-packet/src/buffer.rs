//! Copy-on-write byte buffer with reserved margins at both ends.
//!
//! Protocols build packets from the inside out: the payload first, then one
//! header per layer in front of it. A [`Buffer`] keeps spare room before and
//! after its visible bytes so that prepending a header is O(1) and does not
//! move the payload.
//!
//! ## Sharing
//!
//! Cloning a buffer shares its storage. Every storage records a *dirty
//! range*: the union of the bytes any sharing buffer can see. A buffer may
//! grow into the margin in place, even while shared, when its edge sits on
//! the dirty edge, because no other buffer can observe those bytes yet.
//! Writing to bytes that might be visible elsewhere first detaches a private
//! copy.
//!
//! ```
//! use netsim_packet::Buffer;
//!
//! let mut buffer = Buffer::new();
//! buffer.add_at_start(20);
//! buffer.add_at_end(4);
//! assert_eq!(buffer.size(), 24);
//!
//! buffer.remove_at_start(20)?;
//! buffer.remove_at_end(4)?;
//! assert!(buffer.is_empty());
//! assert!(buffer.remove_at_end(1).is_err());
//! # Ok::<(), netsim_packet::BufferError>(())
//! ```

use std::{cell::RefCell, fmt, rc::Rc};

use crate::error::BufferError;

/// Margin reserved in front of the visible bytes of new storage.
pub const DEFAULT_START_MARGIN: usize = 64;

/// Margin reserved after the visible bytes of new storage.
pub const DEFAULT_END_MARGIN: usize = 32;

/// A type alias for `Result<T, BufferError>`.
pub type BufferResult<T> = Result<T, BufferError>;

#[derive(Debug)]
struct Storage {
    bytes: Vec<u8>,
    dirty_start: usize,
    dirty_end: usize,
}

impl Storage {
    fn with_layout(start_margin: usize, data: &[u8], end_margin: usize) -> Self {
        let mut bytes = vec![0u8; start_margin + data.len() + end_margin];
        bytes[start_margin..start_margin + data.len()].copy_from_slice(data);
        Self {
            bytes,
            dirty_start: start_margin,
            dirty_end: start_margin + data.len(),
        }
    }
}

/// A growable byte region with copy-on-write sharing.
pub struct Buffer {
    storage: Rc<RefCell<Storage>>,
    start: usize,
    end: usize,
}

impl Buffer {
    /// An empty buffer with default margins.
    pub fn new() -> Self {
        Self::from_bytes(&[])
    }

    /// A buffer of `size` zero bytes.
    pub fn with_size(size: usize) -> Self {
        Self::from_storage(Storage::with_layout(
            DEFAULT_START_MARGIN,
            &vec![0u8; size],
            DEFAULT_END_MARGIN,
        ))
    }

    /// A buffer holding a copy of `data`.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_storage(Storage::with_layout(
            DEFAULT_START_MARGIN,
            data,
            DEFAULT_END_MARGIN,
        ))
    }

    fn from_storage(storage: Storage) -> Self {
        let (start, end) = (storage.dirty_start, storage.dirty_end);
        Self {
            storage: Rc::new(RefCell::new(storage)),
            start,
            end,
        }
    }

    /// Number of visible bytes.
    pub fn size(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if no bytes are visible.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns `true` if another buffer shares this buffer's storage.
    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.storage) > 1
    }

    /// Free bytes in front of the visible region.
    pub fn start_margin(&self) -> usize {
        self.start
    }

    /// Free bytes after the visible region.
    pub fn end_margin(&self) -> usize {
        self.storage.borrow().bytes.len() - self.end
    }

    /// A sole owner sees exactly its own bytes.
    fn reclaim_dirty_range(&self) {
        if !self.is_shared() {
            let mut storage = self.storage.borrow_mut();
            storage.dirty_start = self.start;
            storage.dirty_end = self.end;
        }
    }

    /// Moves the visible bytes into fresh, unshared storage with at least
    /// `extra_start` and `extra_end` bytes of margin.
    fn reallocate(&mut self, extra_start: usize, extra_end: usize) {
        // Grow the margin on the growing side with the payload so that
        // repeated appends stay amortized O(1).
        let size = self.size();
        let start_margin = if extra_start > 0 {
            extra_start + DEFAULT_START_MARGIN.max(size / 2)
        } else {
            DEFAULT_START_MARGIN
        };
        let end_margin = if extra_end > 0 {
            extra_end + DEFAULT_END_MARGIN.max(size / 2)
        } else {
            DEFAULT_END_MARGIN
        };
        let storage = {
            let old = self.storage.borrow();
            Storage::with_layout(start_margin, &old.bytes[self.start..self.end], end_margin)
        };
        tracing::debug!(
            size,
            capacity = storage.bytes.len(),
            shared = self.is_shared(),
            "buffer storage reallocated"
        );
        *self = Self::from_storage(storage);
    }

    /// Grows the buffer by `n` zero bytes at the front.
    pub fn add_at_start(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.reclaim_dirty_range();
        let in_place = {
            let storage = self.storage.borrow();
            self.start >= n && storage.dirty_start == self.start
        };
        if !in_place {
            self.reallocate(n, 0);
        }
        let mut storage = self.storage.borrow_mut();
        self.start -= n;
        storage.bytes[self.start..self.start + n].fill(0);
        storage.dirty_start = self.start;
    }

    /// Grows the buffer by `n` zero bytes at the back.
    pub fn add_at_end(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.reclaim_dirty_range();
        let in_place = {
            let storage = self.storage.borrow();
            storage.bytes.len() - self.end >= n && storage.dirty_end == self.end
        };
        if !in_place {
            self.reallocate(0, n);
        }
        let mut storage = self.storage.borrow_mut();
        storage.bytes[self.end..self.end + n].fill(0);
        self.end += n;
        storage.dirty_end = self.end;
    }

    /// Grows the buffer by `n` bytes at the front and lets `fill` write them.
    ///
    /// The new bytes are private to this buffer even when its storage is
    /// shared, so no copy is made.
    pub fn prepend_with<R>(&mut self, n: usize, fill: impl FnOnce(&mut [u8]) -> R) -> R {
        self.add_at_start(n);
        let mut storage = self.storage.borrow_mut();
        fill(&mut storage.bytes[self.start..self.start + n])
    }

    /// Grows the buffer by `n` bytes at the back and lets `fill` write them.
    pub fn append_with<R>(&mut self, n: usize, fill: impl FnOnce(&mut [u8]) -> R) -> R {
        self.add_at_end(n);
        let mut storage = self.storage.borrow_mut();
        fill(&mut storage.bytes[self.end - n..self.end])
    }

    /// Shrinks the buffer by `n` bytes at the front.
    ///
    /// # Errors
    ///
    /// [`BufferError::Underflow`] if `n` exceeds the size; the buffer is left
    /// unchanged.
    pub fn remove_at_start(&mut self, n: usize) -> BufferResult<()> {
        self.check_removal(n)?;
        self.start += n;
        Ok(())
    }

    /// Shrinks the buffer by `n` bytes at the back.
    ///
    /// # Errors
    ///
    /// [`BufferError::Underflow`] if `n` exceeds the size; the buffer is left
    /// unchanged.
    pub fn remove_at_end(&mut self, n: usize) -> BufferResult<()> {
        self.check_removal(n)?;
        self.end -= n;
        Ok(())
    }

    fn check_removal(&self, n: usize) -> BufferResult<()> {
        if n > self.size() {
            return Err(BufferError::Underflow {
                requested: n,
                available: self.size(),
            });
        }
        Ok(())
    }

    fn check_range(&self, offset: usize, len: usize) -> BufferResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size() => Ok(()),
            _ => Err(BufferError::OutOfBounds {
                offset,
                len,
                size: self.size(),
            }),
        }
    }

    /// Detaches a private copy of the storage if it is shared.
    fn make_private(&mut self) {
        if self.is_shared() {
            let storage = {
                let old = self.storage.borrow();
                Storage::with_layout(
                    self.start,
                    &old.bytes[self.start..self.end],
                    old.bytes.len() - self.end,
                )
            };
            tracing::trace!(size = self.size(), "copy-on-write detach");
            *self = Self::from_storage(storage);
        }
    }

    /// Overwrites visible bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// [`BufferError::OutOfBounds`] if the range leaves the visible region.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> BufferResult<()> {
        self.check_range(offset, data.len())?;
        self.make_private();
        let start = self.start + offset;
        self.storage.borrow_mut().bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Copies `len` visible bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// [`BufferError::OutOfBounds`] if the range leaves the visible region.
    pub fn read(&self, offset: usize, len: usize) -> BufferResult<Vec<u8>> {
        self.check_range(offset, len)?;
        let start = self.start + offset;
        Ok(self.storage.borrow().bytes[start..start + len].to_vec())
    }

    /// Runs `f` over the visible bytes without copying them.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let storage = self.storage.borrow();
        f(&storage.bytes[self.start..self.end])
    }

    /// Runs `f` over the visible bytes for in-place mutation, detaching a
    /// private copy first if the storage is shared.
    pub fn with_bytes_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        self.make_private();
        let mut storage = self.storage.borrow_mut();
        f(&mut storage.bytes[self.start..self.end])
    }

    /// A copy of the visible bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.with_bytes(<[u8]>::to_vec)
    }

    /// Copies as many visible bytes as fit into `out`; returns how many.
    pub fn copy_data(&self, out: &mut [u8]) -> usize {
        self.with_bytes(|bytes| {
            let n = bytes.len().min(out.len());
            out[..n].copy_from_slice(&bytes[..n]);
            n
        })
    }

    /// A buffer sharing this storage, restricted to `[offset, offset + len)`.
    ///
    /// # Errors
    ///
    /// [`BufferError::OutOfBounds`] if the range leaves the visible region.
    pub fn create_fragment(&self, offset: usize, len: usize) -> BufferResult<Buffer> {
        self.check_range(offset, len)?;
        Ok(Self {
            storage: Rc::clone(&self.storage),
            start: self.start + offset,
            end: self.start + offset + len,
        })
    }

    /// Appends the visible bytes of `other`.
    pub fn add_buffer_at_end(&mut self, other: &Buffer) {
        if other.is_empty() {
            return;
        }
        // `other` may share this storage, so copy its bytes out first
        let data = other.to_vec();
        self.append_with(data.len(), |dst| dst.copy_from_slice(&data));
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Buffer {
    /// Shares the storage; no bytes are copied.
    fn clone(&self) -> Self {
        Self {
            storage: Rc::clone(&self.storage),
            start: self.start,
            end: self.end,
        }
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.with_bytes(|a| other.with_bytes(|b| a == b))
    }
}

impl Eq for Buffer {}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.size())
            .field("start_margin", &self.start_margin())
            .field("end_margin", &self.end_margin())
            .field("shared", &self.is_shared())
            .finish()
    }
}

impl From<&[u8]> for Buffer {
    fn from(data: &[u8]) -> Self {
        Self::from_bytes(data)
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(&data)
    }
}
