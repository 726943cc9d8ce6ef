//! Packets: a copy-on-write buffer plus tags.

use std::{any::Any, cell::Cell, fmt, ops::Range};

use crate::{
    buffer::Buffer,
    cursor::{BufferReader, BufferWriter},
    error::{PacketError, PacketResult},
    header::{Header, Trailer},
    tags::{ByteTagList, PacketTagList},
};

thread_local! {
    static NEXT_PACKET_UID: Cell<u64> = const { Cell::new(0) };
}

fn next_uid() -> u64 {
    NEXT_PACKET_UID.with(|next| {
        let uid = next.get();
        next.set(uid + 1);
        uid
    })
}

/// Restarts packet uid allocation on this thread at zero.
///
/// Call between independent runs so uids are reproducible.
pub fn reset_packet_uids() {
    NEXT_PACKET_UID.with(|next| next.set(0));
}

/// One simulated protocol data unit.
///
/// Packets are moved between protocol layers. [`Packet::copy`] makes an
/// independent packet that shares bytes until either side modifies them.
pub struct Packet {
    uid: u64,
    buffer: Buffer,
    byte_tags: ByteTagList,
    packet_tags: PacketTagList,
}

impl Packet {
    fn from_buffer(buffer: Buffer) -> Self {
        Self {
            uid: next_uid(),
            buffer,
            byte_tags: ByteTagList::new(),
            packet_tags: PacketTagList::new(),
        }
    }

    /// A packet holding a copy of `payload`.
    pub fn new(payload: impl AsRef<[u8]>) -> Self {
        Self::from_buffer(Buffer::from_bytes(payload.as_ref()))
    }

    /// A packet of `size` zero bytes, for models that only care about length.
    pub fn with_size(size: usize) -> Self {
        Self::from_buffer(Buffer::with_size(size))
    }

    /// An empty packet.
    pub fn empty() -> Self {
        Self::from_buffer(Buffer::new())
    }

    /// Identifier unique among packets created on this thread since the last
    /// [`reset_packet_uids`].
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Size in bytes, headers and trailers included.
    pub fn size(&self) -> usize {
        self.buffer.size()
    }

    /// Returns `true` for a zero-byte packet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The packet's bytes.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// A copy of the packet's bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Copies as many bytes as fit into `out`; returns how many.
    pub fn copy_data(&self, out: &mut [u8]) -> usize {
        self.buffer.copy_data(out)
    }

    /// An independent packet with the same bytes and tags and a fresh uid.
    ///
    /// No bytes are copied until one of the two packets modifies them.
    pub fn copy(&self) -> Packet {
        Self {
            uid: next_uid(),
            buffer: self.buffer.clone(),
            byte_tags: self.byte_tags.clone(),
            packet_tags: self.packet_tags.clone(),
        }
    }

    /// Serializes `header` in front of the packet.
    ///
    /// # Errors
    ///
    /// [`PacketError::SizeMismatch`] if the header writes fewer bytes than it
    /// reports, or the header's own serialization error. The packet is left
    /// unchanged on error.
    pub fn add_header(&mut self, header: &dyn Header) -> PacketResult<()> {
        let size = header.serialized_size();
        let outcome = self.buffer.prepend_with(size, |bytes| {
            write_exact(bytes, header.name(), |w| header.serialize(w))
        });
        if let Err(err) = outcome {
            self.buffer.remove_at_start(size)?;
            return Err(err);
        }
        self.byte_tags.shift_right(size);
        Ok(())
    }

    /// Deserializes a header from the front of the packet and removes its
    /// bytes.
    ///
    /// # Errors
    ///
    /// - [`PacketError::Truncated`] if the packet is too short
    /// - [`PacketError::SizeMismatch`] if the header consumed a different
    ///   number of bytes than its `serialized_size()`
    /// - the header's own validation errors
    pub fn remove_header<H: Header>(&mut self) -> PacketResult<H> {
        let (header, consumed) = self.decode_header::<H>()?;
        self.remove_at_start(consumed)?;
        tracing::trace!(
            uid = self.uid,
            header = %(&header as &dyn Header),
            consumed,
            "removed header"
        );
        Ok(header)
    }

    /// Deserializes a header from the front without removing it.
    ///
    /// Returns `Ok(None)` for an empty packet.
    ///
    /// # Errors
    ///
    /// Same as [`Packet::remove_header`].
    pub fn peek_header<H: Header>(&self) -> PacketResult<Option<H>> {
        if self.is_empty() {
            return Ok(None);
        }
        self.decode_header::<H>().map(|(header, _)| Some(header))
    }

    fn decode_header<H: Header>(&self) -> PacketResult<(H, usize)> {
        self.buffer.with_bytes(|bytes| {
            let mut reader = BufferReader::new(bytes);
            let header = H::deserialize(&mut reader)?;
            let consumed = reader.consumed_from_start();
            check_size(header.name(), header.serialized_size(), consumed)?;
            Ok((header, consumed))
        })
    }

    /// Serializes `trailer` after the end of the packet.
    ///
    /// # Errors
    ///
    /// Same as [`Packet::add_header`].
    pub fn add_trailer(&mut self, trailer: &dyn Trailer) -> PacketResult<()> {
        let size = trailer.serialized_size();
        let outcome = self.buffer.append_with(size, |bytes| {
            write_exact(bytes, trailer.name(), |w| trailer.serialize(w))
        });
        if let Err(err) = outcome {
            self.buffer.remove_at_end(size)?;
            return Err(err);
        }
        Ok(())
    }

    /// Deserializes a trailer from the back of the packet and removes its
    /// bytes.
    ///
    /// # Errors
    ///
    /// Same as [`Packet::remove_header`].
    pub fn remove_trailer<T: Trailer>(&mut self) -> PacketResult<T> {
        let (trailer, consumed) = self.decode_trailer::<T>()?;
        self.remove_at_end(consumed)?;
        tracing::trace!(
            uid = self.uid,
            trailer = %(&trailer as &dyn Trailer),
            consumed,
            "removed trailer"
        );
        Ok(trailer)
    }

    /// Deserializes a trailer from the back without removing it.
    ///
    /// Returns `Ok(None)` for an empty packet.
    ///
    /// # Errors
    ///
    /// Same as [`Packet::remove_header`].
    pub fn peek_trailer<T: Trailer>(&self) -> PacketResult<Option<T>> {
        if self.is_empty() {
            return Ok(None);
        }
        self.decode_trailer::<T>().map(|(trailer, _)| Some(trailer))
    }

    fn decode_trailer<T: Trailer>(&self) -> PacketResult<(T, usize)> {
        self.buffer.with_bytes(|bytes| {
            let mut reader = BufferReader::at_end(bytes);
            let trailer = T::deserialize(&mut reader)?;
            let consumed = reader.consumed_from_end();
            check_size(trailer.name(), trailer.serialized_size(), consumed)?;
            Ok((trailer, consumed))
        })
    }

    /// Removes `n` bytes from the front; byte tags lose the removed bytes.
    ///
    /// # Errors
    ///
    /// [`BufferError::Underflow`](crate::BufferError::Underflow) if `n`
    /// exceeds the size.
    pub fn remove_at_start(&mut self, n: usize) -> PacketResult<()> {
        self.buffer.remove_at_start(n)?;
        self.byte_tags.clip(n..n + self.size());
        Ok(())
    }

    /// Removes `n` bytes from the back; byte tags lose the removed bytes.
    ///
    /// # Errors
    ///
    /// [`BufferError::Underflow`](crate::BufferError::Underflow) if `n`
    /// exceeds the size.
    pub fn remove_at_end(&mut self, n: usize) -> PacketResult<()> {
        self.buffer.remove_at_end(n)?;
        self.byte_tags.clip(0..self.size());
        Ok(())
    }

    /// Appends `n` zero bytes.
    pub fn add_padding_at_end(&mut self, n: usize) {
        self.buffer.add_at_end(n);
    }

    /// Appends the bytes and byte tags of `other`.
    ///
    /// Packet tags of `other` are not merged: they describe `other` as a
    /// whole, not the bytes it contributes.
    pub fn add_at_end(&mut self, other: &Packet) {
        let offset = self.size();
        self.buffer.add_buffer_at_end(&other.buffer);
        self.byte_tags.append(&other.byte_tags, offset);
    }

    /// A new packet holding `[start, start + len)` of this one.
    ///
    /// The fragment shares storage with this packet. It keeps every byte tag
    /// that overlaps the range, clipped to it, and a copy of every packet
    /// tag.
    ///
    /// # Errors
    ///
    /// [`BufferError::OutOfBounds`](crate::BufferError::OutOfBounds) if the
    /// range leaves the packet.
    pub fn create_fragment(&self, start: usize, len: usize) -> PacketResult<Packet> {
        let buffer = self.buffer.create_fragment(start, len)?;
        Ok(Self {
            uid: next_uid(),
            buffer,
            byte_tags: self.byte_tags.fragment(start..start + len),
            packet_tags: self.packet_tags.clone(),
        })
    }

    /// Tags every byte currently in the packet.
    ///
    /// # Errors
    ///
    /// [`PacketError::TagRangeOutOfBounds`] on an empty packet.
    pub fn add_byte_tag<T: Any>(&mut self, tag: T) -> PacketResult<()> {
        self.add_byte_tag_range(tag, 0..self.size())
    }

    /// Tags the bytes in `range`.
    ///
    /// # Errors
    ///
    /// [`PacketError::TagRangeOutOfBounds`] if `range` is empty or extends
    /// past the end of the packet.
    pub fn add_byte_tag_range<T: Any>(&mut self, tag: T, range: Range<usize>) -> PacketResult<()> {
        if range.start >= range.end || range.end > self.size() {
            return Err(PacketError::TagRangeOutOfBounds {
                start: range.start,
                end: range.end,
                size: self.size(),
            });
        }
        self.byte_tags.add(tag, range);
        Ok(())
    }

    /// Byte tags of type `T` with the ranges they cover, oldest first.
    pub fn byte_tags<T: Any>(&self) -> impl Iterator<Item = (Range<usize>, &T)> + '_ {
        self.byte_tags.iter::<T>()
    }

    /// The oldest byte tag of type `T`.
    pub fn find_first_byte_tag<T: Any>(&self) -> Option<&T> {
        self.byte_tags.iter::<T>().next().map(|(_, tag)| tag)
    }

    /// Every byte tag, regardless of type.
    pub fn byte_tag_list(&self) -> &ByteTagList {
        &self.byte_tags
    }

    /// Drops every byte tag.
    pub fn remove_all_byte_tags(&mut self) {
        self.byte_tags.clear();
    }

    /// Attaches a packet tag. Returns `false` if one of the same type is
    /// already attached; the existing tag is kept.
    pub fn add_packet_tag<T: Any>(&mut self, tag: T) -> bool {
        self.packet_tags.add(tag)
    }

    /// The packet tag of type `T`.
    pub fn peek_packet_tag<T: Any>(&self) -> Option<&T> {
        self.packet_tags.peek::<T>()
    }

    /// Detaches the packet tag of type `T`.
    pub fn remove_packet_tag<T: Any + Clone>(&mut self) -> Option<T> {
        self.packet_tags.remove::<T>()
    }

    /// Attaches `tag`, returning the packet tag of the same type it replaced.
    pub fn replace_packet_tag<T: Any + Clone>(&mut self, tag: T) -> Option<T> {
        self.packet_tags.replace(tag)
    }

    /// Every packet tag.
    pub fn packet_tag_list(&self) -> &PacketTagList {
        &self.packet_tags
    }

    /// Drops every packet tag.
    pub fn remove_all_packet_tags(&mut self) {
        self.packet_tags.clear();
    }
}

/// Runs a serializer over `bytes` and checks it filled them exactly.
fn write_exact(
    bytes: &mut [u8],
    name: &'static str,
    serialize: impl FnOnce(&mut BufferWriter<'_>) -> PacketResult<()>,
) -> PacketResult<()> {
    let reported = bytes.len();
    let mut writer = BufferWriter::new(bytes);
    serialize(&mut writer)?;
    check_size(name, reported, writer.written())
}

fn check_size(name: &'static str, reported: usize, actual: usize) -> PacketResult<()> {
    if reported != actual {
        return Err(PacketError::SizeMismatch {
            name,
            reported,
            actual,
        });
    }
    Ok(())
}

impl Default for Packet {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("uid", &self.uid)
            .field("size", &self.size())
            .field("byte_tags", &self.byte_tags)
            .field("packet_tags", &self.packet_tags)
            .finish()
    }
}
