//! Connection manager
//!
//! A [`Connection`] owns at most one live session at a time. Each session is
//! a [`Link`]: the write half behind a mutex, a control handle used to shut
//! the socket down, and the atomic flag that says whether the session is
//! still usable. The receive thread reads from its own clone of the stream.
//!
//! Whoever flips the flag to false (a failed send, the receive loop, or
//! `disconnect`) is the one that reports the `Disconnected` change, so every
//! session produces exactly one.

use crate::receiver::Receiver;
use crate::{
    ConnectionConfig, ConnectionState, DisconnectReason, Json, LinkError, LinkEvent, LinkStream,
    MessageHandler, Result, StateChange, TcpTransport, Transport,
};
use msglink_proto::{Encoding, FrameCodec};
use serde::{de::DeserializeOwned, Serialize};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// One connected session
pub(crate) struct Link<S> {
    connected: AtomicBool,
    writer: Mutex<S>,
    control: S,
}

impl<S: LinkStream> Link<S> {
    fn new(writer: S, control: S) -> Self {
        Self {
            connected: AtomicBool::new(true),
            writer: Mutex::new(writer),
            control,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Mark the session dead and shut the socket down
    ///
    /// Returns true only for the call that ended the session.
    pub(crate) fn close(&self) -> bool {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Err(e) = self.control.shutdown() {
            // Already torn down by the peer; nothing left to release
            debug!("Socket shutdown: {}", e);
        }
        true
    }
}

/// A point-to-point framed message connection
///
/// `M` is the message type, `E` its [`Encoding`], `T` the [`Transport`] used
/// to reach the peer.
pub struct Connection<M: 'static, E = Json, T: Transport = TcpTransport> {
    id: Uuid,
    config: ConnectionConfig,
    transport: T,
    codec: Arc<FrameCodec<E>>,
    handler: Arc<dyn MessageHandler<M>>,
    connecting: AtomicBool,
    link: RwLock<Option<Arc<Link<T::Stream>>>>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl<M> Connection<M, Json, TcpTransport>
where
    M: Serialize + DeserializeOwned + Send + 'static,
{
    /// Create a disconnected JSON connection over TCP
    pub fn new(config: ConnectionConfig, handler: impl MessageHandler<M>) -> Self {
        Self::with_encoding(config, Json, handler)
    }

    /// Create a disconnected JSON connection whose events arrive on a channel
    pub fn channel(config: ConnectionConfig) -> (Self, mpsc::Receiver<LinkEvent<M>>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(config, tx), rx)
    }
}

impl<M, E> Connection<M, E, TcpTransport>
where
    M: Send + 'static,
    E: Encoding<M>,
{
    /// Create a disconnected TCP connection with a custom encoding
    pub fn with_encoding(
        config: ConnectionConfig,
        encoding: E,
        handler: impl MessageHandler<M>,
    ) -> Self {
        let transport = TcpTransport::from_config(&config);
        Self::with_transport(config, encoding, transport, handler)
    }
}

impl<M, E, T> Connection<M, E, T>
where
    M: Send + 'static,
    E: Encoding<M>,
    T: Transport,
{
    /// Create a disconnected connection over any transport
    pub fn with_transport(
        config: ConnectionConfig,
        encoding: E,
        transport: T,
        handler: impl MessageHandler<M>,
    ) -> Self {
        let codec = FrameCodec::with_max_frame_size(encoding, config.max_frame_size);
        Self {
            id: Uuid::new_v4(),
            config,
            transport,
            codec: Arc::new(codec),
            handler: Arc::new(handler),
            connecting: AtomicBool::new(false),
            link: RwLock::new(None),
            receiver: Mutex::new(None),
        }
    }

    /// Connect to the configured peer and start the receive thread
    ///
    /// Blocks until the transport connects or fails. Failure leaves the
    /// connection disconnected and may be retried. The `Connected` hook runs
    /// before the session is visible to `send` and `disconnect`.
    pub fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Err(LinkError::AlreadyConnected);
        }
        if self
            .connecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LinkError::AlreadyConnected);
        }

        let result = self.establish();
        self.connecting.store(false, Ordering::Release);
        result
    }

    fn establish(&self) -> Result<()> {
        if self.is_connected() {
            return Err(LinkError::AlreadyConnected);
        }

        // The previous session's loop must finish delivering before a new one starts
        self.reap_receiver();

        let target = self.config.target();
        info!(id = %self.id, "Connecting to {}", target);

        let connect_error = |source: io::Error| {
            warn!(id = %self.id, "Connection to {} failed: {}", target, source);
            LinkError::Connection {
                target: target.clone(),
                source,
            }
        };

        let stream = self
            .transport
            .connect(&self.config.host, self.config.port)
            .map_err(connect_error)?;
        let reader = stream.try_clone().map_err(connect_error)?;
        let control = stream.try_clone().map_err(connect_error)?;

        // Report before publishing the link so that no Disconnected can precede it
        info!(id = %self.id, "Connected to {}", target);
        self.handler
            .on_state_change(StateChange::Connected { target: target.clone() });

        let link = Arc::new(Link::new(stream, control));
        *self.link.write().unwrap_or_else(PoisonError::into_inner) = Some(link.clone());

        let receiver = Receiver {
            id: self.id,
            link: link.clone(),
            stream: reader,
            codec: self.codec.clone(),
            handler: self.handler.clone(),
            read_buffer_size: self.config.read_buffer_size,
        };

        let spawned = thread::Builder::new()
            .name(format!("msglink-recv-{}", self.id.simple()))
            .spawn(move || receiver.run());

        match spawned {
            Ok(handle) => {
                *self.receiver.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(())
            }
            Err(e) => {
                error!(id = %self.id, "Failed to start receive thread: {}", e);
                if link.close() {
                    let reason = LinkError::Receive(io::Error::new(e.kind(), e.to_string()));
                    self.handler
                        .on_state_change(StateChange::Disconnected(DisconnectReason::Failed(reason)));
                }
                Err(LinkError::Connection { target, source: e })
            }
        }
    }

    /// Encode a message and write it as one frame
    ///
    /// Concurrent calls are serialized; each frame reaches the wire whole.
    /// Encoding errors leave the connection untouched. A write failure closes
    /// it, since the peer's view of the frame boundaries is now unknown.
    pub fn send(&self, message: &M) -> Result<()> {
        let link = self.live_link().ok_or(LinkError::NotConnected)?;
        let frame = self.codec.encode(message)?;

        let mut writer = link.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if !link.is_connected() {
            return Err(LinkError::NotConnected);
        }

        if let Err(e) = writer.write_all(&frame).and_then(|_| writer.flush()) {
            drop(writer);
            warn!(id = %self.id, "Send failed, closing connection: {}", e);
            if link.close() {
                let reason = LinkError::Send(io::Error::new(e.kind(), e.to_string()));
                self.handler
                    .on_state_change(StateChange::Disconnected(DisconnectReason::Failed(reason)));
            }
            return Err(LinkError::Send(e));
        }

        trace!(id = %self.id, bytes = frame.len(), "Frame sent");
        Ok(())
    }
}

impl<M: 'static, E, T: Transport> Connection<M, E, T> {
    /// Unique connection ID, used in log records
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else if self.connecting.load(Ordering::Acquire) {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Check if the connection is live
    pub fn is_connected(&self) -> bool {
        self.live_link().is_some()
    }

    /// Close the connection
    ///
    /// Idempotent, and safe to call from any thread, including from inside a
    /// handler. The pending read on the receive thread fails or hits EOF and
    /// the thread exits; unless called from that thread, this waits for it.
    pub fn disconnect(&self) {
        let link = self.link.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(link) = link {
            if link.close() {
                info!(id = %self.id, "Disconnected from {}", self.config.target());
                self.handler
                    .on_state_change(StateChange::Disconnected(DisconnectReason::Requested));
            }
        }
        self.reap_receiver();
    }

    fn live_link(&self) -> Option<Arc<Link<T::Stream>>> {
        self.link
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|link| link.is_connected())
            .cloned()
    }

    fn reap_receiver(&self) {
        let handle = self.receiver.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(handle) = handle else { return };

        if handle.thread().id() == thread::current().id() {
            // Called from a handler on the receive thread; it exits on return
            return;
        }
        if handle.join().is_err() {
            error!(id = %self.id, "Receive thread panicked");
        }
    }
}

impl<M: 'static, E, T: Transport> Drop for Connection<M, E, T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
