/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the socket (TCP connect or WebSocket upgrade) failed.
    #[error("connect to {url} failed: {source}")]
    ConnectFailed {
        /// The address that was dialed.
        url: String,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failed_display_includes_url() {
        let err = TransportError::ConnectFailed {
            url: "ws://127.0.0.1:1".into(),
            source: std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            ),
        };
        let text = err.to_string();
        assert!(text.contains("ws://127.0.0.1:1"));
        assert!(text.contains("refused"));
    }

    #[test]
    fn test_connection_closed_display() {
        let err = TransportError::ConnectionClosed("peer went away".into());
        assert_eq!(err.to_string(), "connection closed: peer went away");
    }
}
