//! Lifecycle events for passive observers.
//!
//! Callers who only care about their own commands never need this: every
//! error that concerns a call is returned by that call. The event channel
//! is for everything else, such as dashboards, loggers, or code that wants
//! to know when the connection comes and goes.

use std::fmt;
use std::time::Duration;

use hubwire_protocol::{EventEnvelope, SubscriptionId};
use hubwire_transport::ConnectionId;
use tokio::sync::broadcast;

/// Why the client stopped being connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called.
    Requested,
    /// The hub closed the socket.
    ServerClosed,
    /// The socket failed.
    Transport(String),
    /// A heartbeat ping went unanswered.
    HeartbeatTimeout,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("requested"),
            Self::ServerClosed => f.write_str("server closed the connection"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::HeartbeatTimeout => f.write_str("heartbeat timed out"),
        }
    }
}

/// Something that happened to the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A socket to the hub is open; the handshake starts now.
    Connected {
        /// Transport-level id of the new socket.
        connection: ConnectionId,
    },
    /// The hub accepted the access token.
    Authenticated {
        /// Server version announced during the handshake, if any.
        server_version: Option<String>,
    },
    /// The authenticated connection ended.
    Disconnected {
        /// Why it ended.
        reason: DisconnectReason,
        /// Subscriptions that were active on it. They are gone and must
        /// be re-created after reconnecting.
        dropped_subscriptions: Vec<SubscriptionId>,
    },
    /// An attempt to open and authenticate a socket failed for a reason
    /// other than a rejected token (see [`ClientEvent::AuthFailed`]).
    /// Emitted for `connect()` calls and for each failed reconnect attempt.
    ConnectFailed {
        /// The error, as the failing call would report it.
        error: String,
    },
    /// The hub rejected the access token.
    AuthFailed {
        /// The hub's message.
        message: String,
    },
    /// A frame could not be understood. The connection stays up.
    ProtocolError {
        /// What was wrong with it.
        message: String,
    },
    /// A push event arrived. Emitted for every event frame, whether or not
    /// a callback is registered for its subscription.
    Event {
        /// The subscription the hub tagged the event with.
        subscription: Option<SubscriptionId>,
        /// The event itself.
        event: EventEnvelope,
    },
    /// A reconnect attempt will start after `delay`.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Automatic reconnection gave up; the client stays disconnected.
    ReconnectFailed {
        /// Attempts made.
        attempts: u32,
    },
}

/// Fan-out of [`ClientEvent`]s to any number of receivers.
///
/// Emitting never blocks and never fails: with no receivers the event is
/// simply dropped.
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}
