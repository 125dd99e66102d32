//! # msglink
//!
//! A single stream connection to a peer carrying discrete, length-prefixed
//! messages.
//!
//! [`Connection`] owns the socket. `send` may be called from any thread;
//! a dedicated receive thread decodes incoming frames and hands each message
//! to a [`MessageHandler`] in wire order.
//!
//! ```no_run
//! use msglink::{Connection, ConnectionConfig, LinkEvent};
//! use serde_json::{json, Value};
//! use std::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel::<LinkEvent<Value>>();
//! let conn: Connection<Value> = Connection::new(ConnectionConfig::new("127.0.0.1:1555")?, tx);
//! conn.connect()?;
//! conn.send(&json!({"type": "ping"}))?;
//! while let Ok(event) = rx.recv() {
//!     println!("{:?}", event);
//! }
//! # Ok::<(), msglink::LinkError>(())
//! ```

#![warn(missing_docs)]

pub use msglink_proto as proto;

/// Error types for connections
pub mod error;

/// Connection configuration
pub mod config;

/// Connection state machine and change notifications
pub mod state;

/// Consumer hooks for received messages and state changes
pub mod handler;

/// Blocking stream transports
pub mod transport;

/// Connection manager
pub mod connection;

mod receiver;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use error::LinkError;
pub use handler::{handler_fn, FnHandler, LinkEvent, MessageHandler};
pub use proto::{Encoding, Json, Raw};
pub use state::{ConnectionState, DisconnectReason, StateChange};
pub use transport::{LinkStream, TcpTransport, Transport};

/// Result type alias for connection operations
pub type Result<T> = std::result::Result<T, LinkError>;
