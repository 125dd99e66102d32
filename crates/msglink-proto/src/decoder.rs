//! Incremental frame decoding over chunked input
//!
//! A stream transport hands out bytes in whatever chunks it likes: a read may
//! stop in the middle of a header, or return several frames at once.
//! [`FrameDecoder`] accumulates those chunks and yields complete payloads in
//! wire order.
//!
//! ```
//! use msglink_proto::FrameDecoder;
//!
//! let mut decoder = FrameDecoder::new();
//! assert!(decoder.push(&[0, 0]).unwrap().is_empty());
//! let payloads = decoder.push(&[0, 2, b'h', b'i']).unwrap();
//! assert_eq!(&payloads[0][..], b"hi");
//! assert!(decoder.is_idle());
//! ```

use bytes::{Bytes, BytesMut};
use crate::{decode_header, ProtocolError, HEADER_LEN, MAX_FRAME_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Need the 4 header bytes
    Header,
    /// Header consumed, need `length` payload bytes
    Payload { length: usize },
}

/// Partial receive buffer for one stream
#[derive(Debug)]
pub struct FrameDecoder {
    /// Bytes of the in-flight frame (and any that follow it)
    buffer: BytesMut,
    state: State,
    max_frame_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder bounded only by the header format
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Create a decoder that rejects headers announcing more than `max_frame_size`
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            state: State::Header,
            max_frame_size,
        }
    }

    /// Append a chunk and extract every frame it completes
    ///
    /// Returns an empty vector when the chunk only extends the in-flight
    /// frame. A header announcing more than the size policy allows is an
    /// error; the decoder is unusable afterwards since the boundary of the
    /// next frame is unknown.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>, ProtocolError> {
        self.feed(data);

        let mut payloads = Vec::new();
        while let Some(payload) = self.decode_next()? {
            payloads.push(payload);
        }
        Ok(payloads)
    }

    /// Buffer a chunk without extracting frames
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract a single payload from the buffered bytes
    pub fn decode_next(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if let State::Header = self.state {
            if self.buffer.len() < HEADER_LEN {
                return Ok(None);
            }

            let header = self.buffer.split_to(HEADER_LEN);
            let length = decode_header([header[0], header[1], header[2], header[3]]) as usize;

            if length > self.max_frame_size {
                return Err(ProtocolError::FrameTooLarge {
                    size: length,
                    max: self.max_frame_size,
                });
            }

            self.state = State::Payload { length };
        }

        match self.state {
            State::Payload { length } if self.buffer.len() >= length => {
                self.state = State::Header;
                Ok(Some(self.buffer.split_to(length).freeze()))
            }
            _ => Ok(None),
        }
    }

    /// True when no partial frame is buffered, i.e. the stream sits on a frame boundary
    pub fn is_idle(&self) -> bool {
        self.state == State::Header && self.buffer.is_empty()
    }

    /// Bytes expected and received for the in-flight frame, headers included
    ///
    /// `None` on a frame boundary. While the header itself is incomplete
    /// only the header length is known to be expected.
    pub fn pending(&self) -> Option<(usize, usize)> {
        match self.state {
            State::Header if self.buffer.is_empty() => None,
            State::Header => Some((HEADER_LEN, self.buffer.len())),
            State::Payload { length } => {
                Some((HEADER_LEN + length, HEADER_LEN + self.buffer.len()))
            }
        }
    }

    /// Report the in-flight frame as truncated, if there is one
    pub fn truncation(&self) -> Option<ProtocolError> {
        self.pending()
            .map(|(expected, received)| ProtocolError::TruncatedFrame { expected, received })
    }
}
