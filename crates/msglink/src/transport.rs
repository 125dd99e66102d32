//! Blocking stream transports
//!
//! The connection manager needs four things from a transport: connect, write,
//! read and close. [`Transport`] covers connect; the stream it returns covers
//! the rest through [`LinkStream`].

use crate::ConnectionConfig;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// A bidirectional blocking byte stream
///
/// The manager reads from one handle on the receive thread while writing
/// through another, so the stream must be cloneable into handles that share
/// the same underlying connection.
pub trait LinkStream: Read + Write + Send + Sync + Sized + 'static {
    /// Another handle to the same connection
    fn try_clone(&self) -> io::Result<Self>;

    /// Close both directions; pending reads on other handles must return
    fn shutdown(&self) -> io::Result<()>;
}

impl LinkStream for TcpStream {
    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Transport abstraction for establishing streams
pub trait Transport: Send + Sync + 'static {
    /// Stream type produced by this transport
    type Stream: LinkStream;

    /// Connect to the remote host, blocking until established or failed
    fn connect(&self, host: &str, port: u16) -> io::Result<Self::Stream>;
}

/// TCP transport
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    /// Disable Nagle's algorithm
    pub nodelay: bool,
    /// Per-address connect timeout
    pub connect_timeout: Option<Duration>,
    /// Socket read timeout
    pub read_timeout: Option<Duration>,
    /// Socket write timeout
    pub write_timeout: Option<Duration>,
}

impl TcpTransport {
    /// Create a TCP transport from connection settings
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            nodelay: config.nodelay,
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.nodelay)?;
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.write_timeout)?;
        Ok(())
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = match self.connect_timeout {
            None => TcpStream::connect((host, port))?,
            Some(timeout) => {
                let mut last_err = None;
                let mut connected = None;
                for addr in (host, port).to_socket_addrs()? {
                    debug!("Trying {}", addr);
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(stream) => {
                            connected = Some(stream);
                            break;
                        }
                        Err(e) => last_err = Some(e),
                    }
                }
                match connected {
                    Some(stream) => stream,
                    None => {
                        return Err(last_err.unwrap_or_else(|| {
                            io::Error::new(
                                io::ErrorKind::InvalidInput,
                                format!("{} resolved to no addresses", host),
                            )
                        }))
                    }
                }
            }
        };

        self.configure(&stream)?;
        Ok(stream)
    }
}
