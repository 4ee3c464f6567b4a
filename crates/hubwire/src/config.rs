//! Client configuration.

use std::time::Duration;

use hubwire_session::{AccessToken, AuthFlow, ReconnectConfig};
use tracing::warn;

/// Everything a [`HubClient`](crate::HubClient) needs to know up front.
///
/// Build one with [`ClientConfig::new`] and override what you care about
/// with the `with_*` setters:
///
/// ```rust
/// use std::time::Duration;
/// use hubwire::{ClientConfig, ReconnectConfig};
///
/// let config = ClientConfig::new("ws://hub.local:8123/api/websocket", "my-token")
///     .with_request_timeout(Duration::from_secs(10))
///     .with_heartbeat(Duration::from_secs(30))
///     .with_reconnect(ReconnectConfig::disabled());
/// assert_eq!(config.request_timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the hub, e.g. `ws://host:8123/api/websocket`.
    pub url: String,
    /// Long-lived access token presented during the handshake.
    pub token: AccessToken,
    /// Who opens the authentication exchange.
    pub auth_flow: AuthFlow,
    /// Time allowed for `auth_ok` / `auth_invalid` after the socket opens.
    ///
    /// Default: 10 seconds.
    pub auth_timeout: Duration,
    /// Time allowed for each command's result.
    ///
    /// Default: 30 seconds.
    pub request_timeout: Duration,
    /// Time allowed for the TCP connect plus WebSocket upgrade.
    ///
    /// Default: 10 seconds.
    pub connect_timeout: Duration,
    /// Send a `ping` this often while authenticated. `None` disables the
    /// heartbeat.
    pub heartbeat_interval: Option<Duration>,
    /// Buffer of the lifecycle event channel. Slow receivers that fall
    /// further behind than this miss events (`RecvError::Lagged`).
    ///
    /// Default: 256.
    pub event_capacity: usize,
    /// What to do when the socket drops unexpectedly.
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8123/api/websocket".to_string(),
            token: AccessToken::new(""),
            auth_flow: AuthFlow::default(),
            auth_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: None,
            event_capacity: 256,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// A config for `url` and `token` with default timeouts.
    pub fn new(url: impl Into<String>, token: impl Into<AccessToken>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    /// Sets who speaks first in the handshake.
    pub fn with_auth_flow(mut self, flow: AuthFlow) -> Self {
        self.auth_flow = flow;
        self
    }

    /// Sets how long the whole handshake may take.
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Sets how long a command waits for its result.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets how long opening the socket may take.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enables the heartbeat with the given ping interval.
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Sets how many lifecycle events a slow receiver may fall behind.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Sets the automatic reconnect policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`HubClient::with_transport`](crate::HubClient::with_transport).
    /// Zero timeouts fall back to their defaults, a zero heartbeat
    /// interval disables the heartbeat, and a zero event capacity becomes 1.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.token.is_empty() {
            warn!(url = %self.url, "access token is empty, the hub will reject it");
        }
        if self.auth_timeout.is_zero() {
            warn!("auth_timeout is zero, using default");
            self.auth_timeout = defaults.auth_timeout;
        }
        if self.request_timeout.is_zero() {
            warn!("request_timeout is zero, using default");
            self.request_timeout = defaults.request_timeout;
        }
        if self.connect_timeout.is_zero() {
            warn!("connect_timeout is zero, using default");
            self.connect_timeout = defaults.connect_timeout;
        }
        if self.heartbeat_interval.is_some_and(|interval| interval.is_zero()) {
            warn!("heartbeat_interval is zero, disabling heartbeat");
            self.heartbeat_interval = None;
        }
        if self.event_capacity == 0 {
            warn!("event_capacity is 0, clamping to 1");
            self.event_capacity = 1;
        }
        self.reconnect = self.reconnect.validated();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_url_and_token_with_defaults() {
        let config = ClientConfig::new("ws://hub:8123/api/websocket", "tok");
        assert_eq!(config.url, "ws://hub:8123/api/websocket");
        assert_eq!(config.token.expose(), "tok");
        assert_eq!(config.auth_flow, AuthFlow::Eager);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.heartbeat_interval.is_none());
        assert!(config.reconnect.enabled);
    }

    #[test]
    fn test_with_setters_apply_each_field() {
        let config = ClientConfig::new("ws://hub", "tok")
            .with_auth_flow(AuthFlow::ServerFirst)
            .with_auth_timeout(Duration::from_secs(1))
            .with_request_timeout(Duration::from_secs(2))
            .with_connect_timeout(Duration::from_secs(3))
            .with_heartbeat(Duration::from_secs(4))
            .with_event_capacity(8)
            .with_reconnect(ReconnectConfig::disabled());
        assert_eq!(config.auth_flow, AuthFlow::ServerFirst);
        assert_eq!(config.auth_timeout, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.heartbeat_interval, Some(Duration::from_secs(4)));
        assert_eq!(config.event_capacity, 8);
        assert!(!config.reconnect.enabled);
    }

    #[test]
    fn test_validated_replaces_zero_timeouts() {
        let config = ClientConfig::new("ws://hub", "tok")
            .with_auth_timeout(Duration::ZERO)
            .with_request_timeout(Duration::ZERO)
            .with_connect_timeout(Duration::ZERO)
            .validated();
        assert_eq!(config.auth_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validated_zero_heartbeat_disables_it() {
        let config = ClientConfig::new("ws://hub", "tok")
            .with_heartbeat(Duration::ZERO)
            .validated();
        assert!(config.heartbeat_interval.is_none());
    }

    #[test]
    fn test_validated_zero_event_capacity_clamps_to_one() {
        let config = ClientConfig::new("ws://hub", "tok")
            .with_event_capacity(0)
            .validated();
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn test_validated_keeps_sane_values() {
        let config = ClientConfig::new("ws://hub", "tok")
            .with_request_timeout(Duration::from_millis(500))
            .with_heartbeat(Duration::from_secs(5))
            .validated();
        assert_eq!(config.request_timeout, Duration::from_millis(500));
        assert_eq!(config.heartbeat_interval, Some(Duration::from_secs(5)));
    }
}
