//! # hubwire
//!
//! Authenticated, reconnecting WebSocket client for automation hubs.
//!
//! One [`HubClient`] owns one long-lived socket to the hub. It
//! authenticates before anything else is sent, correlates concurrent
//! commands with their results over that single socket, fans pushed
//! events out to subscribers, and reconnects with backoff when the socket
//! drops.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hubwire::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let config = ClientConfig::new("ws://hub.local:8123/api/websocket", "token");
//! let client = HubClient::new(config);
//! client.connect().await?;
//!
//! let config = client.send(Command::new("get_config")).await?;
//! println!("{config}");
//!
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! ```text
//! hubwire (this crate)   HubClient, pending table, subscriptions, events
//!     ↕
//! hubwire-session        handshake, ConnectionState, reconnect backoff
//!     ↕
//! hubwire-protocol       frames and the JSON codec
//!     ↕
//! hubwire-transport      Transport / Connection, WebSocket implementation
//! ```

mod client;
mod config;
mod dispatch;
mod error;
mod event;
mod pending;
mod subscription;

pub use client::HubClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use event::{ClientEvent, DisconnectReason};
pub use subscription::EventCallback;

pub use hubwire_protocol::{Command, EventEnvelope, RequestId, SubscriptionId};
pub use hubwire_session::{AccessToken, AuthFlow, ConnectionState, ReconnectConfig};
pub use hubwire_transport::{Connection, ConnectionId, Transport, WebSocketTransport};

/// Everything needed to use the client, in one import.
pub mod prelude {
    pub use crate::{
        AccessToken, AuthFlow, ClientConfig, ClientError, ClientEvent, Command,
        ConnectionState, DisconnectReason, EventEnvelope, HubClient, ReconnectConfig,
        SubscriptionId,
    };
}
