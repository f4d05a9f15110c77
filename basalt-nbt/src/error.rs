//! NBT error types.

use thiserror::Error;

/// Errors produced while decoding or encoding binary tag data.
///
/// Every decode error carries the byte offset at which it was detected so
/// corrupt chunk payloads can be located inside a region file.
#[derive(Debug, Error)]
pub enum NbtError {
    /// The input ended before the current payload was complete.
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof {
        /// Offset of the failed read.
        offset: usize,
    },

    /// A tag id outside `0..=12` was encountered.
    #[error("unknown tag id {id} at offset {offset}")]
    UnknownTagId {
        /// The offending id byte.
        id: u8,
        /// Offset of the id byte.
        offset: usize,
    },

    /// An `End` tag appeared where a payload-bearing tag was required.
    #[error("unexpected End tag at offset {offset}")]
    UnexpectedEnd {
        /// Offset of the id byte.
        offset: usize,
    },

    /// A string payload was not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the string payload.
        offset: usize,
    },

    /// An array or list declared a negative element count.
    #[error("negative length {len} at offset {offset}")]
    NegativeLength {
        /// The declared count.
        len: i32,
        /// Offset of the length prefix.
        offset: usize,
    },

    /// A non-empty list declared `End` as its element type.
    #[error("non-empty list with End element type at offset {offset}")]
    ListOfEnd {
        /// Offset of the element-type byte.
        offset: usize,
    },

    /// Compounds or lists nested deeper than the parser allows.
    #[error("nesting deeper than {limit} levels at offset {offset}")]
    NestingTooDeep {
        /// The depth limit that was exceeded.
        limit: usize,
        /// Offset at which the limit was hit.
        offset: usize,
    },
}
