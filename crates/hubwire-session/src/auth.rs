//! Credentials and the choice of who speaks first.
//!
//! The hub authenticates a socket with a single long-lived access token.
//! Some hubs greet every new socket with `auth_required` and expect the
//! client to answer it; others just wait for the client. [`AuthFlow`]
//! picks between the two.

use std::fmt;

/// A bearer token presented to the hub in the `auth` frame.
///
/// A newtype so the token never leaks through `{:?}` in logs: the
/// `Debug` impl prints a placeholder instead of the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token. Only the handshake should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `true` if the token is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl From<&str> for AccessToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for AccessToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Which side opens the authentication exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthFlow {
    /// Send `auth` as soon as the socket opens. A later `auth_required`
    /// greeting is accepted and ignored. Works with either kind of hub.
    #[default]
    Eager,

    /// Wait for the hub's `auth_required` greeting, then send `auth`.
    ServerFirst,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("super-secret");
        let text = format!("{token:?}");
        assert!(!text.contains("super-secret"));
    }

    #[test]
    fn test_access_token_expose_returns_raw_value() {
        let token: AccessToken = "abc".into();
        assert_eq!(token.expose(), "abc");
        assert!(!token.is_empty());
        assert!(AccessToken::new("").is_empty());
    }

    #[test]
    fn test_auth_flow_default_is_eager() {
        assert_eq!(AuthFlow::default(), AuthFlow::Eager);
    }
}
