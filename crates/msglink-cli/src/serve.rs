//! Echo peer and listener plumbing shared with the relay
//!
//! Every accepted connection gets its own task that reads complete frames
//! and writes each one straight back. Payloads are never decoded, so the peer
//! works with any encoding.

use anyhow::{Context, Result};
use msglink_proto::{read_frame, write_frame, FrameDecoder, ProtocolError, MAX_FRAME_SIZE};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Echo peer settings
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Address to listen on
    pub bind: String,
    /// Port to listen on
    pub port: u16,
    /// Largest payload accepted from a client
    pub max_frame_size: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: msglink::config::DEFAULT_PORT,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

/// Bind and serve until Ctrl-C
pub async fn run(config: ServeConfig) -> Result<()> {
    let listener = bind(&config).await?;
    info!("Echo peer listening on {}", listener.local_addr()?);

    serve(listener, config.max_frame_size, shutdown_on_ctrl_c()).await
}

/// Bind the configured address
pub async fn bind(config: &ServeConfig) -> Result<TcpListener> {
    TcpListener::bind((config.bind.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.bind, config.port))
}

/// Shutdown flag that flips to true on Ctrl-C
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });
    shutdown_rx
}

/// Accept connections on `listener` until `shutdown` flips to true
pub async fn serve(
    listener: TcpListener,
    max_frame_size: usize,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Echo peer stopped");
                return Ok(());
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        info!("New connection from {}", peer);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            match echo(stream, peer, max_frame_size, shutdown).await {
                                Ok(frames) => info!("{} disconnected after {} frames", peer, frames),
                                Err(e) => warn!("{} dropped: {}", peer, e),
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

/// Echo frames on one connection; returns the number of frames echoed
async fn echo(
    stream: TcpStream,
    peer: SocketAddr,
    max_frame_size: usize,
    mut shutdown: watch::Receiver<bool>,
) -> Result<u64, ProtocolError> {
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = FrameDecoder::with_max_frame_size(max_frame_size);
    let mut frames = 0u64;

    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => return Ok(frames),
            frame = read_frame(&mut decoder, &mut reader) => frame?,
        };

        let Some(frame) = frame else {
            return Ok(frames);
        };

        debug!("Echoing {} byte frame to {}", frame.length(), peer);
        write_frame(&mut writer, &frame).await?;
        frames += 1;
    }
}
