//! Transport abstraction layer for hubwire.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the socket primitive the client talks through. The client only needs
//! four things from a socket: open it, send a text frame, receive the next
//! text frame (or learn that it closed), and close it.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Sequence number of a socket opened by this process.
///
/// Reconnects open new sockets, so the number is what tells two sessions
/// of the same client apart in logs and in `Connected` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// The raw sequence number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket#{}", self.0)
    }
}

/// Opens outgoing connections to a remote endpoint.
///
/// The futures are declared `Send` so a client generic over the transport
/// can drive them from spawned Tokio tasks. Implementations may still
/// write plain `async fn` bodies.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Dials `url` and returns an open connection.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single open connection that carries text frames.
///
/// `send` and `recv` must be usable at the same time from different
/// tasks: the client keeps one task parked in `recv` while callers send.
pub trait Connection: Send + Sync + 'static {
    /// Sends one text frame to the remote peer.
    fn send(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next text frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Sends a close frame and shuts the socket down.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn id(&self) -> ConnectionId;
}
