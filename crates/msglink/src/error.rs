//! Error types for connections

use msglink_proto::ProtocolError;
use std::io;
use thiserror::Error;

/// Errors raised by a [`Connection`](crate::Connection)
#[derive(Debug, Error)]
pub enum LinkError {
    /// Transport-level connect failure; the connection stays disconnected
    #[error("Failed to connect to {target}: {source}")]
    Connection {
        /// `host:port` that was dialled
        target: String,
        /// Underlying transport error
        #[source]
        source: io::Error,
    },

    /// `connect` called on a live or connecting connection
    #[error("Already connected")]
    AlreadyConnected,

    /// `send` called while not connected; no I/O was attempted
    #[error("Not connected")]
    NotConnected,

    /// Writing a frame failed; the connection was closed
    #[error("Send failed: {0}")]
    Send(#[source] io::Error),

    /// Reading from the stream failed; the connection was closed
    #[error("Receive failed: {0}")]
    Receive(#[source] io::Error),

    /// Peer closed the stream inside a frame
    #[error("Truncated frame: received {received} of {expected} bytes")]
    TruncatedFrame {
        /// Bytes the frame needs, header included
        expected: usize,
        /// Bytes received before closure, header included
        received: usize,
    },

    /// Payload bytes could not be decoded; the connection stays up
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Message could not be encoded; nothing was written
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Outgoing payload exceeds the frame size limit; nothing was written
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Offending payload size
        size: usize,
        /// Limit in force
        max: usize,
    },

    /// Peer announced a frame above the configured limit; the connection was closed
    #[error("Peer announced a {size} byte frame (max: {max})")]
    OversizedFrame {
        /// Length from the received header
        size: usize,
        /// Limit in force
        max: usize,
    },

    /// Target string could not be parsed
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

impl LinkError {
    /// Whether this error closed the connection
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Send(_)
                | Self::Receive(_)
                | Self::TruncatedFrame { .. }
                | Self::OversizedFrame { .. }
        )
    }
}

impl From<ProtocolError> for LinkError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Serialization(msg) => Self::Serialization(msg),
            ProtocolError::Deserialization(msg) => Self::Deserialization(msg),
            ProtocolError::FrameTooLarge { size, max } => Self::FrameTooLarge { size, max },
            ProtocolError::TruncatedFrame { expected, received } => {
                Self::TruncatedFrame { expected, received }
            }
            ProtocolError::Io(e) => Self::Receive(e),
        }
    }
}
