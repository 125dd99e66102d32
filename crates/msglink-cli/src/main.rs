//! msglink binary
//!
//! Echo peer, chat relay, chat client and ping check built on msglink
//! connections.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod chat;
mod cli;
mod message;
mod ping;
mod relay;
mod serve;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Serve { listen } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(serve::run(listen.config()))
        }

        Commands::Relay { listen } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(relay::run(listen.config()))
        }

        Commands::Chat { peer, username } => {
            info!("Connecting to {} as {}", peer.config().target(), username);
            chat::run(peer.config(), &username, io::stdin().lock())
        }

        Commands::Ping {
            peer,
            count,
            timeout,
        } => ping::run(peer.config(), count, Duration::from_secs(timeout)).map(|_| ()),
    }
}

/// Log to stderr so chat output on stdout stays clean
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
