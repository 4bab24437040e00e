//! Error types for meshcore-packet.

use thiserror::Error;

/// Errors that can occur while decoding or building packet structures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// A read ran past the end of the buffer.
    #[error("truncated at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        /// Byte offset where the read started.
        offset: usize,
        /// Number of bytes the read required.
        needed: usize,
        /// Number of bytes that were left.
        available: usize,
    },

    /// The path length byte was negative.
    #[error("invalid path length: {0}")]
    InvalidPathLength(i8),

    /// Path is too long to be encoded.
    #[error("path too long: {len} bytes (max {max})")]
    PathTooLong {
        /// Actual path length.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Invalid structure format.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

impl PacketError {
    /// Create a truncation error for a read at `offset`.
    pub fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        PacketError::Truncated {
            offset,
            needed,
            available,
        }
    }

    /// Create an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        PacketError::InvalidFormat(message.into())
    }
}
