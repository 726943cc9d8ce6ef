//! # netsim-packet
//!
//! The packet data model of the netsim kernel.
//!
//! - [`Buffer`]: reference-counted, copy-on-write bytes with O(1) prepend
//! - [`BufferReader`] / [`BufferWriter`]: cursors handed to codecs
//! - [`Header`] / [`Trailer`]: the codec contract every protocol implements
//! - [`Packet`]: a buffer plus byte tags and packet tags
//!
//! Storage is shared through `Rc`, so packets stay on the thread of the
//! simulator that created them.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod buffer;
mod cursor;
mod error;
mod header;
mod packet;
mod tags;

pub use buffer::{Buffer, BufferResult, DEFAULT_END_MARGIN, DEFAULT_START_MARGIN};
pub use cursor::{internet_checksum, BufferReader, BufferWriter};
pub use error::{BufferError, PacketError, PacketResult};
pub use header::{Header, Trailer};
pub use packet::{reset_packet_uids, Packet};
pub use tags::{ByteTagList, PacketTagList};
