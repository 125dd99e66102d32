//! Error types for protocol operations

use std::io;
use thiserror::Error;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The encoding rejected a message
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Payload bytes are not valid for the encoding
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Frame too large
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual payload size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Stream ended inside a frame
    #[error("Truncated frame: received {received} of {expected} bytes")]
    TruncatedFrame {
        /// Bytes the frame needs, header included
        expected: usize,
        /// Bytes received before the stream closed, header included
        received: usize,
    },

    /// I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Whether the error leaves the frame boundary intact.
    ///
    /// Only payload interpretation failures qualify; everything else means
    /// the byte stream can no longer be trusted.
    pub fn is_payload_error(&self) -> bool {
        matches!(self, Self::Serialization(_) | Self::Deserialization(_))
    }
}
