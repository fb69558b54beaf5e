//! Wire protocol error types.

use thiserror::Error;

/// Result type for wire protocol operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while framing or parsing wire traffic.
///
/// Every variant is a protocol violation from the session's point of view:
/// once one is observed the byte stream can no longer be trusted to be
/// frame-aligned.
#[derive(Debug, Error)]
pub enum WireError {
    /// Invalid magic bytes in frame header.
    #[error("invalid magic: expected 0x58594c4d, got 0x{0:08x}")]
    InvalidMagic(u32),

    /// Unsupported protocol version.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    /// Payload exceeds maximum size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: u32, max: u32 },

    /// Checksum mismatch between header and payload.
    #[error("checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// A frame kind that is not valid at this point of the exchange.
    #[error("unexpected frame: expected {expected}, got {actual}")]
    UnexpectedFrame {
        expected: &'static str,
        actual: &'static str,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl From<bincode::Error> for WireError {
    fn from(e: bincode::Error) -> Self {
        WireError::Deserialization(e.to_string())
    }
}
