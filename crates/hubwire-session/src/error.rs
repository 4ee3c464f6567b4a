//! Error types for the session layer.

use std::time::Duration;

use hubwire_protocol::ProtocolError;
use hubwire_transport::TransportError;

/// Errors that can end an authentication handshake.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The hub answered `auth_invalid`. Carries the hub's message (or a
    /// placeholder when it sent none). Never retried automatically.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The hub sent neither `auth_ok` nor `auth_invalid` in time.
    #[error("no authentication response within {0:?}")]
    AuthTimeout(Duration),

    /// The socket closed before the handshake finished.
    #[error("connection closed during handshake")]
    ClosedDuringHandshake,

    /// The socket failed while sending or receiving handshake frames.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The auth frame could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
