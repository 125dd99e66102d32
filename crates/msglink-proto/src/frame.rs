//! Frame structure and header helpers

use bytes::{BufMut, Bytes, BytesMut};
use crate::ProtocolError;

/// Size of the length header in bytes
pub const HEADER_LEN: usize = 4;

/// Largest payload the 32-bit header can describe
const HEADER_MAX: usize = u32::MAX as usize;

/// Encode a payload length as a big-endian header
pub fn encode_header(length: u32) -> [u8; HEADER_LEN] {
    length.to_be_bytes()
}

/// Interpret exactly four bytes as a big-endian payload length
pub fn decode_header(header: [u8; HEADER_LEN]) -> u32 {
    u32::from_be_bytes(header)
}

/// One length-prefixed unit on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    /// Wrap a payload, rejecting anything the header cannot describe
    pub fn from_payload(payload: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let payload = payload.into();
        if payload.len() > HEADER_MAX {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: HEADER_MAX,
            });
        }
        Ok(Self { payload })
    }

    /// Payload length as carried in the header
    pub fn length(&self) -> u32 {
        // from_payload bounds the length
        self.payload.len() as u32
    }

    /// Header bytes for this frame
    pub fn header(&self) -> [u8; HEADER_LEN] {
        encode_header(self.length())
    }

    /// Frame payload
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Total size on the wire
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Header followed by payload, ready to write
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_u32(self.length());
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}
