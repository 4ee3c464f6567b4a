//! Session layer for hubwire.
//!
//! Everything about a connection that outlives a single frame:
//!
//! 1. **Authentication**: the access token and the handshake that
//!    presents it ([`AccessToken`], [`AuthFlow`], [`Handshake`])
//! 2. **State**: where the connection stands ([`ConnectionState`])
//! 3. **Reconnection**: how long to wait between attempts after the
//!    socket drops ([`ReconnectConfig`], [`Backoff`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Client (above)  ← drives the state machine, owns the connection
//!     ↕
//! Session Layer (this crate)  ← authenticates sockets, paces reconnects
//!     ↕
//! Protocol / Transport (below)  ← frames and sockets
//! ```

mod auth;
mod backoff;
mod error;
mod handshake;
mod state;

pub use auth::{AccessToken, AuthFlow};
pub use backoff::{Backoff, ReconnectConfig};
pub use error::SessionError;
pub use handshake::{Handshake, HandshakeOutcome};
pub use state::ConnectionState;
