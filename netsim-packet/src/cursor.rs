//! Cursors over a byte window, used by header and trailer codecs.
//!
//! A [`BufferWriter`] fills the bytes a packet just reserved for a header or
//! trailer; a [`BufferReader`] decodes them back. Both track how far they
//! moved in each direction so the packet can check a codec's reported size
//! against what it actually processed.
//!
//! Multi-byte integers come in network order (`_be`) and little-endian
//! (`_le`) flavours. Nothing here panics on short windows: running off
//! either edge is [`PacketError::Truncated`].

use crate::error::{PacketError, PacketResult};

/// Computes the 16-bit one's complement Internet checksum (RFC 1071).
///
/// `initial` is added to the running sum before folding, which lets callers
/// chain a pseudo-header sum into the computation. An odd trailing byte is
/// padded with a zero low byte.
///
/// ```
/// use netsim_packet::internet_checksum;
///
/// // RFC 1071 section 3 example
/// let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
/// assert_eq!(internet_checksum(&data, 0), !0xddf2);
/// ```
pub fn internet_checksum(data: &[u8], initial: u32) -> u16 {
    let mut sum = u64::from(initial);
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u64::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        sum += u64::from(*last) << 8;
    }
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Read cursor over an immutable byte window.
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    data: &'a [u8],
    pos: usize,
    low: usize,
    high: usize,
}

impl<'a> BufferReader<'a> {
    /// Cursor at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            low: 0,
            high: 0,
        }
    }

    /// Cursor at the end of `data`, for trailers that read backward.
    pub fn at_end(data: &'a [u8]) -> Self {
        let len = data.len();
        Self {
            data,
            pos: len,
            low: len,
            high: len,
        }
    }

    /// Current offset from the start of the window.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Size of the whole window.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes between the cursor and the end of the window.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Bytes between the start of the window and the furthest point read.
    pub fn consumed_from_start(&self) -> usize {
        self.high
    }

    /// Bytes between the earliest point reached and the end of the window.
    pub fn consumed_from_end(&self) -> usize {
        self.data.len() - self.low
    }

    /// Moves the cursor forward without reading.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than `n` bytes remain.
    pub fn skip(&mut self, n: usize) -> PacketResult<()> {
        self.take(n).map(|_| ())
    }

    /// Moves the cursor backward by `n` bytes.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if the cursor is less than `n` bytes from
    /// the start of the window.
    pub fn prev(&mut self, n: usize) -> PacketResult<()> {
        if n > self.pos {
            return Err(PacketError::Truncated {
                needed: n,
                have: self.pos,
            });
        }
        self.pos -= n;
        self.low = self.low.min(self.pos);
        Ok(())
    }

    fn take(&mut self, n: usize) -> PacketResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(PacketError::Truncated {
                needed: n,
                have: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.low = self.low.min(self.pos);
        self.pos += n;
        self.high = self.high.max(self.pos);
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> PacketResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads the next `n` bytes as a slice of the window.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than `n` bytes remain.
    pub fn read_bytes(&mut self, n: usize) -> PacketResult<&'a [u8]> {
        self.take(n)
    }

    /// Fills `out` from the window.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than `out.len()` bytes remain.
    pub fn read_into(&mut self, out: &mut [u8]) -> PacketResult<()> {
        out.copy_from_slice(self.take(out.len())?);
        Ok(())
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] at the end of the window.
    pub fn read_u8(&mut self) -> PacketResult<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Reads a network-order `u16`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 2 bytes remain.
    pub fn read_u16_be(&mut self) -> PacketResult<u16> {
        self.take_array().map(u16::from_be_bytes)
    }

    /// Reads a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 2 bytes remain.
    pub fn read_u16_le(&mut self) -> PacketResult<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    /// Reads a network-order `u32`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 4 bytes remain.
    pub fn read_u32_be(&mut self) -> PacketResult<u32> {
        self.take_array().map(u32::from_be_bytes)
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 4 bytes remain.
    pub fn read_u32_le(&mut self) -> PacketResult<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    /// Reads a network-order `u64`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 8 bytes remain.
    pub fn read_u64_be(&mut self) -> PacketResult<u64> {
        self.take_array().map(u64::from_be_bytes)
    }

    /// Reads a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 8 bytes remain.
    pub fn read_u64_le(&mut self) -> PacketResult<u64> {
        self.take_array().map(u64::from_le_bytes)
    }

    /// Checksums the next `len` bytes with [`internet_checksum`] and moves
    /// past them.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than `len` bytes remain.
    pub fn checksum(&mut self, len: usize, initial: u32) -> PacketResult<u16> {
        self.take(len).map(|bytes| internet_checksum(bytes, initial))
    }
}

/// Write cursor over a mutable byte window.
#[derive(Debug)]
pub struct BufferWriter<'a> {
    data: &'a mut [u8],
    pos: usize,
    high: usize,
}

impl<'a> BufferWriter<'a> {
    /// Cursor at the start of `data`.
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            data,
            pos: 0,
            high: 0,
        }
    }

    /// Current offset from the start of the window.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Size of the whole window.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes between the cursor and the end of the window.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Bytes between the start of the window and the furthest point written
    /// or skipped.
    pub fn written(&self) -> usize {
        self.high
    }

    /// The whole window, including bytes not written yet.
    pub fn window(&self) -> &[u8] {
        self.data
    }

    /// Moves the cursor forward, leaving the bytes as they are.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than `n` bytes remain.
    pub fn skip(&mut self, n: usize) -> PacketResult<()> {
        self.reserve(n).map(|_| ())
    }

    /// Moves the cursor backward, typically to patch a checksum field.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if the cursor is less than `n` bytes from
    /// the start of the window.
    pub fn prev(&mut self, n: usize) -> PacketResult<()> {
        if n > self.pos {
            return Err(PacketError::Truncated {
                needed: n,
                have: self.pos,
            });
        }
        self.pos -= n;
        Ok(())
    }

    fn reserve(&mut self, n: usize) -> PacketResult<&mut [u8]> {
        if n > self.remaining() {
            return Err(PacketError::Truncated {
                needed: n,
                have: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += n;
        self.high = self.high.max(self.pos);
        Ok(&mut self.data[start..start + n])
    }

    /// Writes `bytes` verbatim.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if the window is too short.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> PacketResult<()> {
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Writes `n` copies of `byte`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if the window is too short.
    pub fn write_repeated(&mut self, byte: u8, n: usize) -> PacketResult<()> {
        self.reserve(n)?.fill(byte);
        Ok(())
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] at the end of the window.
    pub fn write_u8(&mut self, value: u8) -> PacketResult<()> {
        self.write_bytes(&[value])
    }

    /// Writes a network-order `u16`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 2 bytes remain.
    pub fn write_u16_be(&mut self, value: u16) -> PacketResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Writes a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 2 bytes remain.
    pub fn write_u16_le(&mut self, value: u16) -> PacketResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a network-order `u32`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 4 bytes remain.
    pub fn write_u32_be(&mut self, value: u32) -> PacketResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Writes a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 4 bytes remain.
    pub fn write_u32_le(&mut self, value: u32) -> PacketResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a network-order `u64`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 8 bytes remain.
    pub fn write_u64_be(&mut self, value: u64) -> PacketResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Writes a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// [`PacketError::Truncated`] if fewer than 8 bytes remain.
    pub fn write_u64_le(&mut self, value: u64) -> PacketResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }
}
