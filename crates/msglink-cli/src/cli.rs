//! Command-line interface definitions

use crate::serve::ServeConfig;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

/// msglink CLI
#[derive(Parser, Debug)]
#[command(name = "msglink")]
#[command(about = "Length-prefixed message link: echo peer, chat relay, chat client and ping check")]
#[command(version)]
pub struct Cli {
    /// Log level override (trace, debug, info, warn, error); defaults to RUST_LOG
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an echo peer that sends every frame back unchanged
    Serve {
        /// Listening address
        #[command(flatten)]
        listen: ListenArgs,
    },

    /// Run a chat relay that forwards each client's messages to the others
    Relay {
        /// Listening address
        #[command(flatten)]
        listen: ListenArgs,
    },

    /// Chat over a connection, one message per stdin line
    Chat {
        /// Peer to connect to
        #[command(flatten)]
        peer: PeerArgs,

        /// Name announced to the peer
        #[arg(short, long)]
        username: String,
    },

    /// Measure round trips through an echo peer
    Ping {
        /// Peer to connect to
        #[command(flatten)]
        peer: PeerArgs,

        /// Number of pings
        #[arg(short, long, default_value_t = 4)]
        count: u64,

        /// Seconds to wait for each reply
        #[arg(short, long, default_value_t = 5)]
        timeout: u64,
    },
}

/// Listener arguments shared by `serve` and `relay`
#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Listen port
    #[arg(short, long, default_value_t = msglink::config::DEFAULT_PORT)]
    pub port: u16,

    /// Largest payload accepted from a client, in bytes
    #[arg(long)]
    pub max_frame_size: Option<usize>,
}

impl ListenArgs {
    /// Listener settings
    pub fn config(&self) -> ServeConfig {
        let defaults = ServeConfig::default();
        ServeConfig {
            bind: self.bind.clone(),
            port: self.port,
            max_frame_size: self.max_frame_size.unwrap_or(defaults.max_frame_size),
        }
    }
}

/// Peer address arguments
#[derive(Args, Debug, Clone)]
pub struct PeerArgs {
    /// Peer host
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Peer port
    #[arg(short, long, default_value_t = msglink::config::DEFAULT_PORT)]
    pub port: u16,

    /// Connect timeout in seconds
    #[arg(long)]
    pub connect_timeout: Option<u64>,
}

impl PeerArgs {
    /// Connection settings for this peer
    pub fn config(&self) -> msglink::ConnectionConfig {
        let config = msglink::ConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            ..Default::default()
        };
        match self.connect_timeout {
            Some(secs) => config.with_connect_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}
