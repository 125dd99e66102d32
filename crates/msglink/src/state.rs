//! Connection state machine and change notifications

use crate::LinkError;
use std::fmt;

/// Connection status
///
/// `Disconnected -> Connecting -> Connected -> Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket held
    Disconnected,
    /// Transport connect in progress
    Connecting,
    /// Socket live, receive thread running
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Why a connected session ended
#[derive(Debug)]
pub enum DisconnectReason {
    /// `disconnect` was called or the connection was dropped
    Requested,
    /// Peer closed the stream on a frame boundary
    PeerClosed,
    /// An error that makes the stream unusable
    Failed(LinkError),
}

impl DisconnectReason {
    /// True for the normal endings, requested or clean peer closure
    pub fn is_clean(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("disconnect requested"),
            Self::PeerClosed => f.write_str("peer closed the connection"),
            Self::Failed(err) => write!(f, "{}", err),
        }
    }
}

/// Notification passed to [`MessageHandler::on_state_change`](crate::MessageHandler::on_state_change)
#[derive(Debug)]
pub enum StateChange {
    /// The transport connected and the receive thread is starting
    Connected {
        /// `host:port` of the peer
        target: String,
    },
    /// The session ended; sent exactly once per `Connected`
    Disconnected(DisconnectReason),
}

impl StateChange {
    /// State entered by this change
    pub fn state(&self) -> ConnectionState {
        match self {
            Self::Connected { .. } => ConnectionState::Connected,
            Self::Disconnected(_) => ConnectionState::Disconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }

    #[test]
    fn test_disconnect_reason() {
        assert!(DisconnectReason::Requested.is_clean());
        assert!(DisconnectReason::PeerClosed.is_clean());

        let failed = DisconnectReason::Failed(LinkError::Receive(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset by peer",
        )));
        assert!(!failed.is_clean());
        assert_eq!(failed.to_string(), "Receive failed: reset by peer");
    }

    #[test]
    fn test_state_change_target_state() {
        let change = StateChange::Connected { target: "127.0.0.1:1555".into() };
        assert_eq!(change.state(), ConnectionState::Connected);
        assert_eq!(
            StateChange::Disconnected(DisconnectReason::PeerClosed).state(),
            ConnectionState::Disconnected
        );
    }
}
