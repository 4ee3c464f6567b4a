//! Unified error type for the hubwire client.

use std::time::Duration;

use hubwire_protocol::{ProtocolError, RequestId};
use hubwire_session::SessionError;
use hubwire_transport::TransportError;

/// Every way a client call can fail.
///
/// When using the `hubwire` crate you deal with this single error type
/// instead of importing errors from each layer. Transport and protocol
/// errors convert with `#[from]`; handshake errors are mapped onto the
/// matching client variants by the `From<SessionError>` impl below.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Socket-level failure (connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The hub rejected the access token. Never retried automatically.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The hub did not accept or reject the token in time.
    #[error("no authentication response within {0:?}")]
    AuthenticationTimeout(Duration),

    /// A command was issued while the client was not authenticated.
    #[error("not connected")]
    NotConnected,

    /// `connect()` was called on an authenticated client.
    #[error("already connected")]
    AlreadyConnected,

    /// `connect()` was called while another caller's connect is running.
    #[error("a connect is already in progress")]
    AlreadyConnecting,

    /// No result arrived for a command before its deadline.
    #[error("{id} timed out after {timeout:?}")]
    RequestTimeout {
        /// The request that went unanswered.
        id: RequestId,
        /// The timeout it was given.
        timeout: Duration,
    },

    /// The hub answered the command with `success: false`.
    #[error("hub returned an error ({}): {message}", .code.as_deref().unwrap_or("no code"))]
    Remote {
        /// Machine-readable error code, if the hub sent one.
        code: Option<String>,
        /// Human-readable description.
        message: String,
    },

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connection went away while the call was outstanding.
    #[error("connection closed")]
    ConnectionClosed,
}

impl From<SessionError> for ClientError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AuthFailed(message) => Self::AuthenticationFailed(message),
            SessionError::AuthTimeout(timeout) => Self::AuthenticationTimeout(timeout),
            SessionError::ClosedDuringHandshake => Self::ConnectionClosed,
            SessionError::Transport(e) => Self::Transport(e),
            SessionError::Protocol(e) => Self::Protocol(e),
        }
    }
}
