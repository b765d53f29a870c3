//! Parse and build errors for DNS wire data.

use thiserror::Error;

/// Result alias for wire-format operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while decoding or encoding DNS wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The input ended before the expected structure was complete.
    #[error("short buffer: need {need} bytes at offset {offset}, have {have}")]
    ShortBuffer {
        /// Offset at which more data was required.
        offset: usize,
        /// Bytes required from that offset.
        need: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// A label exceeded 63 bytes.
    #[error("label of {len} bytes exceeds the 63 byte limit")]
    LabelTooLong {
        /// Offending label length.
        len: usize,
    },

    /// A name exceeded 255 bytes of wire form.
    #[error("name of {len} bytes exceeds the 255 byte limit")]
    NameTooLong {
        /// Offending name length.
        len: usize,
    },

    /// A character not allowed in presentation-format labels.
    #[error("invalid character {ch:?} in label")]
    BadLabelChar {
        /// The rejected character.
        ch: char,
    },

    /// A compression pointer referenced a later (or equal) offset.
    #[error("forward compression pointer at offset {offset}")]
    BadPointer {
        /// Offset of the pointer bytes.
        offset: usize,
    },

    /// Too many compression pointer jumps while reading one name.
    #[error("compression pointer chain too long")]
    PointerChain,

    /// A length byte used the reserved 0x40/0x80 prefixes.
    #[error("reserved label type {byte:#04x} at offset {offset}")]
    ReservedLabelType {
        /// The offending length byte.
        byte: u8,
        /// Its offset in the message.
        offset: usize,
    },

    /// RDATA did not have the length its type requires.
    #[error("bad rdata length {len} for {rtype}")]
    BadRdataLen {
        /// Record type name.
        rtype: &'static str,
        /// Length found on the wire.
        len: usize,
    },

    /// A name inside RDATA ran past the RDATA boundary.
    #[error("rdata name overruns the record boundary")]
    RdataOverrun,

    /// Message bytes remained after all counted sections were read.
    #[error("{len} trailing bytes after the last section")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        len: usize,
    },
}

impl Error {
    pub(crate) fn short(offset: usize, need: usize, have: usize) -> Self {
        Self::ShortBuffer { offset, need, have }
    }
}
