//! The codec contract implemented by protocol headers and trailers.
//!
//! A header type knows its own byte layout. [`Packet`](crate::Packet) asks
//! it for its size, reserves exactly that many bytes and hands it a
//! [`BufferWriter`] over them. On the way back up the stack, the packet hands
//! a [`BufferReader`] to `deserialize` and measures how far it moved.
//!
//! The size a codec reports and the bytes it actually processes must agree:
//! a disagreement would desynchronize every header behind it, so the packet
//! rejects it with [`PacketError::SizeMismatch`](crate::PacketError).
//!
//! `dyn Header` and `dyn Trailer` implement [`Display`](fmt::Display)
//! through [`Header::print`], which defaults to the codec's name. Override it
//! to show field values in traces and packet dumps.
//!
//! # Examples
//!
//! ```
//! use netsim_packet::{BufferReader, BufferWriter, Header, Packet, PacketResult};
//!
//! #[derive(Debug, PartialEq)]
//! struct PortHeader {
//!     source: u16,
//!     destination: u16,
//! }
//!
//! impl Header for PortHeader {
//!     fn serialized_size(&self) -> usize {
//!         4
//!     }
//!
//!     fn serialize(&self, writer: &mut BufferWriter<'_>) -> PacketResult<()> {
//!         writer.write_u16_be(self.source)?;
//!         writer.write_u16_be(self.destination)
//!     }
//!
//!     fn deserialize(reader: &mut BufferReader<'_>) -> PacketResult<Self> {
//!         Ok(Self {
//!             source: reader.read_u16_be()?,
//!             destination: reader.read_u16_be()?,
//!         })
//!     }
//! }
//!
//! let mut packet = Packet::new(b"hello");
//! packet.add_header(&PortHeader { source: 1024, destination: 80 })?;
//! assert_eq!(packet.size(), 9);
//!
//! let header: PortHeader = packet.remove_header()?;
//! assert_eq!(header.destination, 80);
//! assert_eq!(packet.to_vec(), b"hello");
//! # Ok::<(), netsim_packet::PacketError>(())
//! ```

use std::fmt;

use crate::{
    cursor::{BufferReader, BufferWriter},
    error::PacketResult,
};

/// A protocol header, serialized in front of the bytes it encapsulates.
pub trait Header {
    /// Number of bytes [`Header::serialize`] writes.
    fn serialized_size(&self) -> usize;

    /// Writes the header into a window of exactly `serialized_size()` bytes.
    fn serialize(&self, writer: &mut BufferWriter<'_>) -> PacketResult<()>;

    /// Reads a header from the front of the packet.
    ///
    /// The reader starts at the first byte of the packet; the header must
    /// consume exactly the `serialized_size()` of the value it returns.
    fn deserialize(reader: &mut BufferReader<'_>) -> PacketResult<Self>
    where
        Self: Sized;

    /// Name used in diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Human-readable rendering of the decoded fields.
    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A protocol trailer, serialized after the bytes it encapsulates.
pub trait Trailer {
    /// Number of bytes [`Trailer::serialize`] writes.
    fn serialized_size(&self) -> usize;

    /// Writes the trailer into a window of exactly `serialized_size()` bytes,
    /// cursor at the window start.
    fn serialize(&self, writer: &mut BufferWriter<'_>) -> PacketResult<()>;

    /// Reads a trailer from the back of the packet.
    ///
    /// The reader starts at the *end* of the packet. Implementations step
    /// back with [`BufferReader::prev`] before reading; the trailer's size is
    /// measured from the earliest byte reached.
    fn deserialize(reader: &mut BufferReader<'_>) -> PacketResult<Self>
    where
        Self: Sized;

    /// Name used in diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Human-readable rendering of the decoded fields.
    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for dyn Header + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print(f)
    }
}

impl fmt::Display for dyn Trailer + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print(f)
    }
}
