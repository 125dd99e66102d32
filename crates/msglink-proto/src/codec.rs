//! Message to frame codec

use crate::{decode_header, Encoding, Frame, FrameDecoder, Json, ProtocolError, HEADER_LEN};
use bytes::Bytes;

/// Maximum frame size: the largest length the 32-bit header can carry
pub const MAX_FRAME_SIZE: usize = u32::MAX as usize;

/// Frame codec for encoding messages to frames and decoding them back
///
/// The codec owns no stream state. Partial input is accumulated by a
/// [`FrameDecoder`] obtained from [`FrameCodec::decoder`].
pub struct FrameCodec<E = Json> {
    /// Payload encoding
    encoding: E,
    /// Maximum payload size allowed
    max_frame_size: usize,
}

impl Default for FrameCodec<Json> {
    fn default() -> Self {
        Self::new(Json)
    }
}

impl<E> FrameCodec<E> {
    /// Create a codec bounded only by the header format
    pub fn new(encoding: E) -> Self {
        Self {
            encoding,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Create a codec with a stricter payload size policy
    pub fn with_max_frame_size(encoding: E, max_frame_size: usize) -> Self {
        Self {
            encoding,
            max_frame_size: max_frame_size.min(MAX_FRAME_SIZE),
        }
    }

    /// Maximum payload size this codec accepts
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Fresh partial receive buffer sharing this codec's size policy
    pub fn decoder(&self) -> FrameDecoder {
        FrameDecoder::with_max_frame_size(self.max_frame_size)
    }

    /// Serialize a message and prepend its length header
    pub fn encode<M>(&self, message: &M) -> Result<Bytes, ProtocolError>
    where
        E: Encoding<M>,
    {
        Ok(self.encode_frame(message)?.to_bytes())
    }

    /// Serialize a message into a [`Frame`]
    pub fn encode_frame<M>(&self, message: &M) -> Result<Frame, ProtocolError>
    where
        E: Encoding<M>,
    {
        let payload = self.encoding.serialize(message)?;
        if payload.len() > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: self.max_frame_size,
            });
        }
        Frame::from_payload(payload)
    }

    /// Interpret a 4-byte header as a payload length
    pub fn decode_header(header: [u8; HEADER_LEN]) -> u32 {
        decode_header(header)
    }

    /// Deserialize exactly `length` payload bytes
    ///
    /// A failure here concerns this payload only; the frame boundary it was
    /// read from is still valid.
    pub fn decode_payload<M>(&self, bytes: &[u8], length: u32) -> Result<M, ProtocolError>
    where
        E: Encoding<M>,
    {
        if bytes.len() != length as usize {
            return Err(ProtocolError::TruncatedFrame {
                expected: HEADER_LEN + length as usize,
                received: HEADER_LEN + bytes.len(),
            });
        }
        self.encoding.deserialize(bytes)
    }

    /// Deserialize the payload of a complete frame
    pub fn decode_frame<M>(&self, frame: &Frame) -> Result<M, ProtocolError>
    where
        E: Encoding<M>,
    {
        self.decode_payload(frame.payload(), frame.length())
    }
}
