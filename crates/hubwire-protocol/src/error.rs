//! Error types for the protocol layer.
//!
//! Each crate in hubwire defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in turning frames into text
//! or text into frames, not in networking or authentication.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a frame into text).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The text is not valid JSON at all.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The frame is JSON but has no string `type` discriminator.
    #[error("frame has no type discriminator")]
    MissingType,

    /// The `type` discriminator names a frame this client does not know.
    #[error("unrecognized frame type: {0}")]
    UnknownType(String),

    /// The message is invalid at the protocol level.
    ///
    /// For frames that carry a known `type` but the wrong shape, or that
    /// arrive at a point in the conversation where they make no sense.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
