//! Consumer hooks for received messages and state changes
//!
//! The receive thread calls the handler for every decoded message, in wire
//! order, and for every state transition. Handlers run on whichever thread
//! caused the event (the receive thread for incoming data, the caller's
//! thread for `send` failures and `disconnect`), so they should hand work
//! off rather than block.

use crate::{LinkError, StateChange};
use std::sync::mpsc;
use tracing::trace;

/// Event forwarded by the channel handlers
#[derive(Debug)]
pub enum LinkEvent<M> {
    /// A decoded message, or the per-message decode failure
    Message(Result<M, LinkError>),
    /// A connection state transition
    State(StateChange),
}

/// Receiver of messages and state changes for one connection
pub trait MessageHandler<M>: Send + Sync + 'static {
    /// Called once per received frame
    ///
    /// `Err` carries [`LinkError::Deserialization`]: the frame arrived
    /// intact but its payload could not be decoded. The connection stays up.
    fn on_message(&self, message: Result<M, LinkError>);

    /// Called on every transition into `Connected` or `Disconnected`
    fn on_state_change(&self, change: StateChange) {
        let _ = change;
    }
}

impl<M: Send + 'static> MessageHandler<M> for mpsc::Sender<LinkEvent<M>> {
    fn on_message(&self, message: Result<M, LinkError>) {
        if self.send(LinkEvent::Message(message)).is_err() {
            trace!("Event receiver dropped, discarding message");
        }
    }

    fn on_state_change(&self, change: StateChange) {
        let state = change.state();
        if self.send(LinkEvent::State(change)).is_err() {
            trace!(%state, "Event receiver dropped, discarding state change");
        }
    }
}

impl<M: Send + 'static> MessageHandler<M> for tokio::sync::mpsc::UnboundedSender<LinkEvent<M>> {
    fn on_message(&self, message: Result<M, LinkError>) {
        if self.send(LinkEvent::Message(message)).is_err() {
            trace!("Event receiver dropped, discarding message");
        }
    }

    fn on_state_change(&self, change: StateChange) {
        let state = change.state();
        if self.send(LinkEvent::State(change)).is_err() {
            trace!(%state, "Event receiver dropped, discarding state change");
        }
    }
}

/// Handler built from closures, see [`handler_fn`]
pub struct FnHandler<F, S> {
    on_message: F,
    on_state: S,
}

/// Build a handler from a message closure
///
/// State changes are ignored unless [`FnHandler::on_state`] adds a closure
/// for them.
pub fn handler_fn<M, F>(on_message: F) -> FnHandler<F, fn(StateChange)>
where
    F: Fn(Result<M, LinkError>) + Send + Sync + 'static,
{
    FnHandler {
        on_message,
        on_state: |_| {},
    }
}

impl<F, S> FnHandler<F, S> {
    /// Replace the state change closure
    pub fn on_state<S2>(self, on_state: S2) -> FnHandler<F, S2>
    where
        S2: Fn(StateChange) + Send + Sync + 'static,
    {
        FnHandler {
            on_message: self.on_message,
            on_state,
        }
    }
}

impl<M, F, S> MessageHandler<M> for FnHandler<F, S>
where
    F: Fn(Result<M, LinkError>) + Send + Sync + 'static,
    S: Fn(StateChange) + Send + Sync + 'static,
{
    fn on_message(&self, message: Result<M, LinkError>) {
        (self.on_message)(message)
    }

    fn on_state_change(&self, change: StateChange) {
        (self.on_state)(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DisconnectReason;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_std_channel_handler() {
        let (tx, rx) = mpsc::channel::<LinkEvent<u32>>();
        tx.on_message(Ok(7));
        tx.on_state_change(StateChange::Disconnected(DisconnectReason::PeerClosed));

        assert!(matches!(rx.recv().unwrap(), LinkEvent::Message(Ok(7))));
        assert!(matches!(
            rx.recv().unwrap(),
            LinkEvent::State(StateChange::Disconnected(DisconnectReason::PeerClosed))
        ));
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = mpsc::channel::<LinkEvent<u32>>();
        drop(rx);
        tx.on_message(Ok(1));
        tx.on_state_change(StateChange::Disconnected(DisconnectReason::Requested));
    }

    #[test]
    fn test_tokio_channel_handler() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<LinkEvent<String>>();
        tx.on_message(Err(LinkError::Deserialization("bad".into())));

        match rx.try_recv().unwrap() {
            LinkEvent::Message(Err(LinkError::Deserialization(msg))) => assert_eq!(msg, "bad"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_fn_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let states = Arc::new(Mutex::new(Vec::new()));

        let handler = {
            let seen = seen.clone();
            let states = states.clone();
            handler_fn(move |msg: Result<u8, LinkError>| seen.lock().unwrap().push(msg.ok()))
                .on_state(move |change: StateChange| states.lock().unwrap().push(change.state()))
        };

        handler.on_message(Ok(3));
        handler.on_message(Err(LinkError::Deserialization("x".into())));
        handler.on_state_change(StateChange::Connected { target: "peer".into() });

        assert_eq!(*seen.lock().unwrap(), vec![Some(3), None]);
        assert_eq!(*states.lock().unwrap(), vec![crate::ConnectionState::Connected]);
    }
}
