//! Multi-client chat relay
//!
//! A client registers its name with a `hello`. From then on every `chat` it
//! sends is forwarded to all other registered clients under that name, and
//! its arrival and departure are announced to them. Pings are answered to
//! the sender alone, so `msglink ping` works against a relay too.

use crate::message::ChatMessage;
use crate::serve::{bind, shutdown_on_ctrl_c, ServeConfig};
use anyhow::Result;
use msglink_proto::{read_frame, write_frame, Frame, FrameCodec, Json, ProtocolError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, error, info, warn};

/// Registered client: its name and the queue drained by its writer task
struct Client {
    username: String,
    outbox: mpsc::UnboundedSender<Frame>,
}

/// Shared relay state
pub struct Relay {
    codec: FrameCodec<Json>,
    clients: RwLock<HashMap<u64, Client>>,
    next_id: AtomicU64,
}

impl Relay {
    /// Create a relay accepting payloads up to `max_frame_size` bytes
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            codec: FrameCodec::with_max_frame_size(Json, max_frame_size),
            clients: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Names of the registered clients, sorted
    pub async fn usernames(&self) -> Vec<String> {
        let clients = self.clients.read().await;
        let mut names: Vec<String> = clients.values().map(|c| c.username.clone()).collect();
        names.sort();
        names
    }

    /// Accept connections on `listener` until `shutdown` flips to true
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Relay stopped");
                    return Ok(());
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!("New connection from {}", peer);
                            let relay = self.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) = relay.handle(stream, peer, shutdown).await {
                                    warn!("{} dropped: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept failed: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ProtocolError> {
        stream.set_nodelay(true)?;
        let (mut reader, mut writer) = stream.into_split();

        let (outbox, mut inbox) = mpsc::unbounded_channel::<Frame>();
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = inbox.recv().await {
                write_frame(&mut writer, &frame).await?;
            }
            Ok::<_, ProtocolError>(())
        });

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut decoder = self.codec.decoder();
        let mut username: Option<String> = None;

        let result = loop {
            let frame = tokio::select! {
                _ = shutdown.changed() => break Ok(()),
                frame = read_frame(&mut decoder, &mut reader) => frame,
            };
            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            let message: ChatMessage = match self.codec.decode_frame(&frame) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Skipping unreadable frame from {}: {}", peer, e);
                    continue;
                }
            };

            match message {
                ChatMessage::Hello { username: name } if username.is_none() => {
                    self.join(id, &name, outbox.clone()).await;
                    username = Some(name);
                }
                ChatMessage::Hello { .. } => debug!("Ignoring repeated hello from {}", peer),
                ChatMessage::Chat { text, .. } => match &username {
                    Some(name) => {
                        let chat = ChatMessage::Chat {
                            from: name.clone(),
                            text,
                        };
                        self.broadcast(&chat, Some(id)).await;
                    }
                    None => warn!("Dropping chat from {} before hello", peer),
                },
                ChatMessage::Ping { .. } => {
                    let _ = outbox.send(frame);
                }
                ChatMessage::Left { .. } => debug!("Ignoring left notice from {}", peer),
            }
        };

        if let Some(name) = username {
            self.leave(id, &name).await;
        }
        info!("{} disconnected", peer);

        // The registry no longer holds a sender, so the writer drains and stops
        drop(outbox);
        match writer_task.await {
            Ok(Err(e)) => debug!("Writer for {} stopped: {}", peer, e),
            Err(e) => error!("Writer task for {} failed: {}", peer, e),
            Ok(Ok(())) => {}
        }

        result
    }

    async fn join(&self, id: u64, username: &str, outbox: mpsc::UnboundedSender<Frame>) {
        self.clients.write().await.insert(
            id,
            Client {
                username: username.to_string(),
                outbox,
            },
        );
        debug!("Online: {}", self.usernames().await.join(", "));

        let notice = ChatMessage::Hello {
            username: username.to_string(),
        };
        self.broadcast(&notice, Some(id)).await;
    }

    async fn leave(&self, id: u64, username: &str) {
        self.clients.write().await.remove(&id);
        let notice = ChatMessage::Left {
            username: username.to_string(),
        };
        self.broadcast(&notice, None).await;
    }

    /// Queue `message` for every registered client except `except`
    async fn broadcast(&self, message: &ChatMessage, except: Option<u64>) {
        let frame = match self.codec.encode_frame(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Cannot relay {}: {}", message, e);
                return;
            }
        };
        info!("{}", message);

        let clients = self.clients.read().await;
        for (id, client) in clients.iter() {
            if Some(*id) == except {
                continue;
            }
            if client.outbox.send(frame.clone()).is_err() {
                debug!("{} is going away, skipping", client.username);
            }
        }
    }
}

/// Bind and relay until Ctrl-C
pub async fn run(config: ServeConfig) -> Result<()> {
    let listener = bind(&config).await?;
    let relay = Arc::new(Relay::new(config.max_frame_size));
    info!(
        "Relay listening on {} (max frame {} bytes)",
        listener.local_addr()?,
        relay.codec.max_frame_size()
    );

    relay.serve(listener, shutdown_on_ctrl_c()).await
}
