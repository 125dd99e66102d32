//! Line-oriented chat client

use crate::message::ChatMessage;
use anyhow::{Context, Result};
use msglink::{handler_fn, Connection, ConnectionConfig, LinkError, StateChange};
use std::io::BufRead;
use tracing::{debug, info, warn};

/// Line that ends the session
const EXIT_COMMAND: &str = "exit";

/// Connect, announce `username`, then send one chat message per input line
///
/// Stops on `exit`, end of input, or when the link goes down.
pub fn run(config: ConnectionConfig, username: &str, input: impl BufRead) -> Result<()> {
    let target = config.target();
    let handler = handler_fn(|message: Result<ChatMessage, LinkError>| match message {
        Ok(message) => println!("{}", message),
        Err(e) => warn!("Dropped unreadable message: {}", e),
    })
    .on_state(|change| match change {
        StateChange::Connected { target } => println!("* connected to {}", target),
        StateChange::Disconnected(reason) if reason.is_clean() => {
            println!("* disconnected: {}", reason)
        }
        StateChange::Disconnected(reason) => {
            warn!("Connection lost: {}", reason);
            println!("* connection lost: {}", reason)
        }
    });

    let conn = Connection::new(config, handler);
    conn.connect()
        .with_context(|| format!("Failed to connect to {}", target))?;

    let result = chat(&conn, username, input);
    conn.disconnect();
    result
}

fn chat(conn: &Connection<ChatMessage>, username: &str, input: impl BufRead) -> Result<()> {
    conn.send(&ChatMessage::Hello {
        username: username.to_string(),
    })?;
    info!("Joined as {}", username);

    for line in input.lines() {
        let line = line.context("Failed to read input")?;
        let text = line.trim();
        if text == EXIT_COMMAND {
            debug!("Exit requested");
            break;
        }
        if text.is_empty() {
            continue;
        }

        let message = ChatMessage::Chat {
            from: username.to_string(),
            text: text.to_string(),
        };
        if let Err(e) = conn.send(&message) {
            warn!("Send failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
