//! Messages exchanged by the chat client and ping check

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat protocol message, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatMessage {
    /// Sent once after connecting; relayed to others as a join notice
    Hello {
        /// Name chosen by the user
        username: String,
    },
    /// One line of chat
    Chat {
        /// Sender's username
        from: String,
        /// Message text
        text: String,
    },
    /// Relay notice that a client went away
    Left {
        /// Name the client had announced
        username: String,
    },
    /// Round-trip check
    Ping {
        /// Sequence number, omitted for a bare ping
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hello { username } => write!(f, "* {} joined", username),
            Self::Chat { from, text } => write!(f, "{}: {}", from, text),
            Self::Left { username } => write!(f, "* {} left", username),
            Self::Ping { seq: Some(seq) } => write!(f, "ping #{}", seq),
            Self::Ping { seq: None } => f.write_str("ping"),
        }
    }
}
