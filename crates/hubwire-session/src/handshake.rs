//! The authentication handshake.
//!
//! Runs once per socket, right after it opens and before anything else is
//! allowed through:
//!
//! ```text
//! client                          hub
//!   │ ── (optional) ←─ auth_required │
//!   │ ── auth {access_token} ──────→ │
//!   │ ←──────── auth_ok | auth_invalid│
//! ```
//!
//! Authentication is scoped to the socket. Every reconnect runs the whole
//! exchange again.

use std::time::Duration;

use hubwire_protocol::{AuthFrame, ClientFrame, Codec, ProtocolError, ServerFrame};
use hubwire_transport::Connection;
use tracing::{debug, info};

use crate::{AccessToken, AuthFlow, SessionError};

/// What the hub told us while accepting the credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeOutcome {
    /// Server version from `auth_required` / `auth_ok`, if announced.
    pub server_version: Option<String>,
}

/// A reusable description of how to authenticate a socket.
#[derive(Debug, Clone)]
pub struct Handshake {
    token: AccessToken,
    flow: AuthFlow,
    timeout: Duration,
}

impl Handshake {
    /// Creates a handshake that presents `token`, following `flow`, and
    /// gives up after `timeout`.
    pub fn new(token: AccessToken, flow: AuthFlow, timeout: Duration) -> Self {
        Self {
            token,
            flow,
            timeout,
        }
    }

    /// Authenticates `conn`.
    ///
    /// Frames that fail to decode, or that are not auth frames, are passed
    /// to `on_protocol_error` and skipped. They do not end the handshake.
    ///
    /// On any failure except a socket that already closed by itself, the
    /// connection is closed before returning.
    ///
    /// # Errors
    /// - [`SessionError::AuthFailed`]: the hub sent `auth_invalid`
    /// - [`SessionError::AuthTimeout`]: no verdict within the timeout
    /// - [`SessionError::ClosedDuringHandshake`]: the socket closed
    /// - [`SessionError::Transport`] / [`SessionError::Protocol`]: I/O or
    ///   encoding failures
    pub async fn run<C, K, F>(
        &self,
        conn: &C,
        codec: &K,
        mut on_protocol_error: F,
    ) -> Result<HandshakeOutcome, SessionError>
    where
        C: Connection,
        K: Codec,
        F: FnMut(ProtocolError) + Send,
    {
        let conn_id = conn.id();
        let result =
            match tokio::time::timeout(self.timeout, self.exchange(conn, codec, &mut on_protocol_error))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SessionError::AuthTimeout(self.timeout)),
            };

        match &result {
            Ok(outcome) => {
                info!(%conn_id, version = ?outcome.server_version, "authenticated");
            }
            Err(SessionError::ClosedDuringHandshake) => {}
            Err(e) => {
                debug!(%conn_id, error = %e, "handshake failed, closing socket");
                if let Err(close_err) = conn.close().await {
                    debug!(%conn_id, error = %close_err, "close after failed handshake");
                }
            }
        }
        result
    }

    async fn exchange<C, K, F>(
        &self,
        conn: &C,
        codec: &K,
        on_protocol_error: &mut F,
    ) -> Result<HandshakeOutcome, SessionError>
    where
        C: Connection,
        K: Codec,
        F: FnMut(ProtocolError) + Send,
    {
        let mut auth_sent = false;
        let mut server_version = None;

        if self.flow == AuthFlow::Eager {
            self.send_auth(conn, codec).await?;
            auth_sent = true;
        }

        loop {
            let Some(text) = conn.recv().await? else {
                return Err(SessionError::ClosedDuringHandshake);
            };

            match codec.decode(&text) {
                Ok(ServerFrame::AuthRequired(status)) => {
                    server_version = status.version.or(server_version);
                    if auth_sent {
                        debug!("auth_required after auth was sent, ignoring");
                    } else {
                        self.send_auth(conn, codec).await?;
                        auth_sent = true;
                    }
                }
                Ok(ServerFrame::AuthOk(status)) => {
                    return Ok(HandshakeOutcome {
                        server_version: status.version.or(server_version),
                    });
                }
                Ok(ServerFrame::AuthInvalid(rejection)) => {
                    return Err(SessionError::AuthFailed(
                        rejection
                            .message
                            .unwrap_or_else(|| "credential rejected".to_string()),
                    ));
                }
                Ok(other) => on_protocol_error(ProtocolError::InvalidMessage(format!(
                    "unexpected {} frame during handshake",
                    other.kind()
                ))),
                Err(e) => on_protocol_error(e),
            }
        }
    }

    async fn send_auth<C: Connection, K: Codec>(
        &self,
        conn: &C,
        codec: &K,
    ) -> Result<(), SessionError> {
        let frame = ClientFrame::Auth(AuthFrame {
            access_token: self.token.expose().to_string(),
        });
        let text = codec.encode(&frame)?;
        conn.send(&text).await?;
        Ok(())
    }
}
