//! # msglink Protocol
//!
//! Length-prefixed framing for msglink connections.
//!
//! A frame on the wire is a 4-byte big-endian payload length followed by
//! exactly that many payload bytes. The payload is whatever the configured
//! [`Encoding`] produces for a message; the framing layer never looks inside.

#![warn(missing_docs)]

/// Frame structure and header helpers
pub mod frame;

/// Pluggable payload encodings
pub mod encoding;

/// Message to frame codec
pub mod codec;

/// Incremental frame decoding over chunked input
pub mod decoder;

/// Frame I/O over async streams
pub mod io;

/// Error types for protocol operations
pub mod error;

pub use codec::{FrameCodec, MAX_FRAME_SIZE};
pub use decoder::FrameDecoder;
pub use encoding::{Encoding, Json, Raw};
#[cfg(feature = "rmp-serde")]
pub use encoding::MsgPack;
#[cfg(feature = "bincode")]
pub use encoding::Bincode;
pub use error::ProtocolError;
pub use frame::{decode_header, encode_header, Frame, HEADER_LEN};
pub use io::{read_frame, write_frame};
