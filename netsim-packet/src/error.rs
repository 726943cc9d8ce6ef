//! Error types for buffers, packets and header codecs.

use netsim_core::SimulationError;

/// Errors raised by [`Buffer`](crate::Buffer) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// More bytes were removed than the buffer holds.
    #[error("cannot remove {requested} bytes from a buffer of {available}")]
    Underflow {
        /// Bytes asked to remove.
        requested: usize,
        /// Bytes actually visible.
        available: usize,
    },

    /// A read, write or fragment range falls outside the visible region.
    #[error("range {offset}+{len} is outside a buffer of {size} bytes")]
    OutOfBounds {
        /// First byte of the range.
        offset: usize,
        /// Length of the range.
        len: usize,
        /// Visible size of the buffer.
        size: usize,
    },
}

/// Errors raised by [`Packet`](crate::Packet) operations and header codecs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// The underlying buffer rejected an operation.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// A reader ran past the end of its window.
    #[error("truncated: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the window.
        have: usize,
    },

    /// A codec consumed or produced a different number of bytes than it
    /// reported through `serialized_size`.
    #[error("{name}: serialized size is {reported} bytes but {actual} were processed")]
    SizeMismatch {
        /// Name of the header or trailer type.
        name: &'static str,
        /// Size returned by `serialized_size`.
        reported: usize,
        /// Bytes actually written or read.
        actual: usize,
    },

    /// A byte tag range does not fit inside the packet.
    #[error("byte tag range {start}..{end} is outside a packet of {size} bytes")]
    TagRangeOutOfBounds {
        /// Start of the rejected range.
        start: usize,
        /// End of the rejected range.
        end: usize,
        /// Packet size.
        size: usize,
    },

    /// A header decoded but its contents are invalid.
    #[error("{name}: malformed: {reason}")]
    Malformed {
        /// Name of the header or trailer type.
        name: &'static str,
        /// What was wrong.
        reason: String,
    },
}

/// A type alias for `Result<T, PacketError>`.
pub type PacketResult<T> = Result<T, PacketError>;

impl From<PacketError> for SimulationError {
    fn from(err: PacketError) -> Self {
        SimulationError::model(err)
    }
}

impl From<BufferError> for SimulationError {
    fn from(err: BufferError) -> Self {
        SimulationError::model(PacketError::Buffer(err))
    }
}
