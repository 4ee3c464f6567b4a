//! The connection state machine.

use std::fmt;

/// Where the client's single connection currently stands.
///
/// ```text
///   Disconnected ──connect()──→ Connecting ──socket open──→ AwaitingAuth
///        ↑                          ↑                             │
///        │                          └──────(reconnect)──────┐    auth_ok
///        │                                                  │     ▼
///        └────────────── Closing ←──disconnect()────── Authenticated
/// ```
///
/// Commands, subscribes and unsubscribes are only accepted in
/// [`ConnectionState::Authenticated`]; in any other state they fail
/// immediately instead of queueing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No socket, nothing in progress.
    #[default]
    Disconnected,
    /// Dialing the hub (or waiting between reconnect attempts).
    Connecting,
    /// Socket open, handshake running.
    AwaitingAuth,
    /// Handshake done; traffic allowed.
    Authenticated,
    /// `disconnect()` is tearing the connection down.
    Closing,
}

impl ConnectionState {
    /// `true` once the hub has accepted the credential.
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }

    /// `true` while a transport socket is open (handshaking or ready).
    pub fn is_connected(self) -> bool {
        matches!(self, Self::AwaitingAuth | Self::Authenticated)
    }

    /// `true` while a connect or reconnect is underway.
    pub fn is_connecting(self) -> bool {
        matches!(self, Self::Connecting | Self::AwaitingAuth)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingAuth => "awaiting_auth",
            Self::Authenticated => "authenticated",
            Self::Closing => "closing",
        })
    }
}
