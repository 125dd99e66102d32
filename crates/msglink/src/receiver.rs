//! Receive loop run on the dedicated per-connection thread

use crate::connection::Link;
use crate::{DisconnectReason, LinkError, LinkStream, MessageHandler, StateChange};
use msglink_proto::{Encoding, FrameCodec, ProtocolError};
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

pub(crate) struct Receiver<M, E, S> {
    pub(crate) id: Uuid,
    pub(crate) link: Arc<Link<S>>,
    pub(crate) stream: S,
    pub(crate) codec: Arc<FrameCodec<E>>,
    pub(crate) handler: Arc<dyn MessageHandler<M>>,
    pub(crate) read_buffer_size: usize,
}

impl<M, E, S> Receiver<M, E, S>
where
    M: 'static,
    E: Encoding<M>,
    S: LinkStream,
{
    /// Drive the loop until the session ends, then report why
    pub(crate) fn run(mut self) {
        debug!(id = %self.id, "Receive loop started");
        let reason = self.receive();

        if self.link.close() {
            match &reason {
                DisconnectReason::Failed(err) => warn!(id = %self.id, "Connection lost: {}", err),
                other => info!(id = %self.id, "Connection closed: {}", other),
            }
            self.handler.on_state_change(StateChange::Disconnected(reason));
        } else {
            debug!(id = %self.id, "Receive loop exited after disconnect");
        }
    }

    fn receive(&mut self) -> DisconnectReason {
        let mut decoder = self.codec.decoder();
        let mut buf = vec![0u8; self.read_buffer_size.max(1)];

        loop {
            if !self.link.is_connected() {
                return DisconnectReason::Requested;
            }

            let n = match self.stream.read(&mut buf) {
                Ok(0) => {
                    return match decoder.truncation() {
                        Some(err) => DisconnectReason::Failed(err.into()),
                        None => DisconnectReason::PeerClosed,
                    };
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return DisconnectReason::Failed(LinkError::Receive(e)),
            };
            trace!(id = %self.id, bytes = n, "Read chunk");

            decoder.feed(&buf[..n]);
            loop {
                if !self.link.is_connected() {
                    return DisconnectReason::Requested;
                }
                match decoder.decode_next() {
                    Ok(Some(payload)) => {
                        if let Err(err) = self.deliver(&payload) {
                            return DisconnectReason::Failed(err);
                        }
                    }
                    Ok(None) => break,
                    Err(ProtocolError::FrameTooLarge { size, max }) => {
                        return DisconnectReason::Failed(LinkError::OversizedFrame { size, max });
                    }
                    Err(err) => return DisconnectReason::Failed(err.into()),
                }
            }
        }
    }

    /// Hand one payload to the handler; `Err` only when the stream is unusable
    fn deliver(&self, payload: &[u8]) -> Result<(), LinkError> {
        trace!(id = %self.id, bytes = payload.len(), "Frame received");
        match self.codec.decode_payload::<M>(payload, payload.len() as u32) {
            Ok(message) => self.handler.on_message(Ok(message)),
            Err(err) if err.is_payload_error() => {
                warn!(id = %self.id, "Dropping undecodable frame of {} bytes: {}", payload.len(), err);
                self.handler.on_message(Err(err.into()));
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }
}
