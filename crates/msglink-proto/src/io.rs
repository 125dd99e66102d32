//! Frame I/O over async streams

use crate::{Frame, FrameDecoder, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read size used when the decoder needs more input
const READ_CHUNK: usize = 8192;

/// Read the next complete frame from an async reader
///
/// Bytes past the returned frame stay in `decoder` for the next call, so
/// the same decoder must be used for the whole stream. Returns `Ok(None)`
/// when the stream closes on a frame boundary and
/// [`ProtocolError::TruncatedFrame`] when it closes inside one.
pub async fn read_frame<R>(
    decoder: &mut FrameDecoder,
    reader: &mut R,
) -> Result<Option<Frame>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(payload) = decoder.decode_next()? {
            return Frame::from_payload(payload).map(Some);
        }

        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return match decoder.truncation() {
                Some(err) => Err(err),
                None => Ok(None),
            };
        }

        decoder.feed(&chunk[..n]);
    }
}

/// Write a whole frame and flush
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.header()).await?;
    writer.write_all(frame.payload()).await?;
    writer.flush().await?;
    Ok(())
}
