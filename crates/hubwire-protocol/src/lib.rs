//! Wire protocol for hubwire.
//!
//! This crate defines the "language" the client and the hub speak:
//!
//! - **Types** ([`Command`], [`ClientFrame`], [`ServerFrame`], ids):
//!   the frames that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those frames are
//!   converted to and from text.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (text frames) and session
//! (authentication state). It holds no state of its own.
//!
//! ```text
//! Transport (text) → Protocol (ServerFrame) → Session / Client
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    AuthFrame, AuthRejection, AuthStatus, ClientFrame, Command, CommandFrame,
    EventEnvelope, EventFrame, FrameKind, PongFrame, RemoteFailure, RequestId,
    ResultFrame, ServerFrame, SubscriptionId,
};
