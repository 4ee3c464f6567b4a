//! Codec trait and the JSON implementation.
//!
//! A "codec" (coder/decoder) converts between frames and the transport's
//! text payloads. The rest of the client doesn't care how frames are
//! serialized, it only needs something that implements [`Codec`].

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ClientFrame, FrameKind, ProtocolError, ServerFrame};

/// Encodes outgoing frames to text and classifies incoming text.
///
/// Codecs are stateless: `Send + Sync + 'static` so one instance can be
/// shared by every task that touches the connection.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a client frame into one text payload.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode(&self, frame: &ClientFrame) -> Result<String, ProtocolError>;

    /// Parses one text payload into a classified server frame.
    ///
    /// # Errors
    /// - [`ProtocolError::Decode`]: not valid JSON
    /// - [`ProtocolError::MissingType`]: no string `type` field
    /// - [`ProtocolError::UnknownType`]: unrecognized `type`
    /// - [`ProtocolError::InvalidMessage`]: known `type`, wrong shape
    fn decode(&self, text: &str) -> Result<ServerFrame, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that speaks JSON text frames (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use hubwire_protocol::{
///     ClientFrame, Codec, Command, CommandFrame, JsonCodec, RequestId, ServerFrame,
/// };
///
/// let codec = JsonCodec;
///
/// let text = codec
///     .encode(&ClientFrame::Command(CommandFrame {
///         id: RequestId(1),
///         command: Command::new("get_states"),
///     }))
///     .unwrap();
/// assert_eq!(text, r#"{"id":1,"type":"get_states"}"#);
///
/// let frame = codec
///     .decode(r#"{"id":1,"type":"result","success":true,"result":[]}"#)
///     .unwrap();
/// assert!(matches!(frame, ServerFrame::Result(r) if r.id == RequestId(1)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, frame: &ClientFrame) -> Result<String, ProtocolError> {
        serde_json::to_string(frame).map_err(ProtocolError::Encode)
    }

    fn decode(&self, text: &str) -> Result<ServerFrame, ProtocolError> {
        // Two passes: first into a generic `Value` so we can read the
        // discriminator, then into the concrete frame struct.
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::Decode)?;

        let kind = match value.get("type") {
            Some(Value::String(tag)) => FrameKind::from_tag(tag)
                .ok_or_else(|| ProtocolError::UnknownType(tag.clone()))?,
            _ => return Err(ProtocolError::MissingType),
        };

        Ok(match kind {
            FrameKind::AuthRequired => ServerFrame::AuthRequired(shape(kind, value)?),
            FrameKind::AuthOk => ServerFrame::AuthOk(shape(kind, value)?),
            FrameKind::AuthInvalid => ServerFrame::AuthInvalid(shape(kind, value)?),
            FrameKind::Result => ServerFrame::Result(shape(kind, value)?),
            FrameKind::Event => ServerFrame::Event(shape(kind, value)?),
            FrameKind::Pong => ServerFrame::Pong(shape(kind, value)?),
        })
    }
}

/// Deserializes the body of a frame whose kind is already known.
fn shape<T: DeserializeOwned>(kind: FrameKind, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value)
        .map_err(|e| ProtocolError::InvalidMessage(format!("malformed {kind} frame: {e}")))
}
