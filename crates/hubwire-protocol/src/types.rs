//! Core protocol types for the hub's wire format.
//!
//! Every frame on the socket is a JSON object with a `type` discriminator.
//! Outgoing frames are either the one-off auth frame or a correlated
//! command (`{"id": N, "type": "...", ...fields}`); incoming frames are
//! auth replies, command results, pushed events, or pongs.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The correlation id of one outbound command.
///
/// Same newtype pattern as any other id: a `u64` underneath, but you
/// can't pass a random integer where a request id is expected.
/// `#[serde(transparent)]` keeps it a plain number on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Handle for a standing event subscription.
///
/// It is the [`RequestId`] of the `subscribe_events` command that created
/// the subscription: the server tags every pushed event with that id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

impl From<RequestId> for SubscriptionId {
    fn from(id: RequestId) -> Self {
        Self(id.0)
    }
}

impl From<SubscriptionId> for RequestId {
    fn from(id: SubscriptionId) -> Self {
        Self(id.0)
    }
}

// ---------------------------------------------------------------------------
// Command, the body of a correlated request
// ---------------------------------------------------------------------------

/// A command to send to the hub, minus its correlation id.
///
/// The `type` tag plus any command-specific fields. The client attaches
/// the id when it sends the command, so the same `Command` value can be
/// reused across calls.
///
/// ```rust
/// use hubwire_protocol::Command;
///
/// let cmd = Command::new("call_service")
///     .with("domain", "light")
///     .with("service", "turn_on");
/// assert_eq!(cmd.kind(), "call_service");
/// assert_eq!(cmd.field("domain"), Some(&serde_json::json!("light")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Command {
    /// Keys owned by the frame itself; [`Command::with`] ignores them.
    pub const RESERVED_KEYS: [&'static str; 2] = ["id", "type"];

    /// Creates a command with the given `type` tag and no fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Adds a command-specific field. `id` and `type` are reserved and
    /// silently ignored.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !Self::RESERVED_KEYS.contains(&key.as_str()) {
            self.fields.insert(key, value.into());
        }
        self
    }

    /// Builds a command from an arbitrary JSON object such as
    /// `{"type": "get_states"}`. Any `id` in the object is dropped.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MissingType`] if the value is not an
    /// object with a string `type`.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::MissingType);
        };
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(ProtocolError::MissingType),
        };
        fields.remove("id");
        Ok(Self { kind, fields })
    }

    /// `subscribe_events`, optionally restricted to one event type.
    pub fn subscribe_events(event_type: Option<&str>) -> Self {
        let cmd = Self::new("subscribe_events");
        match event_type {
            Some(event_type) => cmd.with("event_type", event_type),
            None => cmd,
        }
    }

    /// `unsubscribe_events` for a subscription created earlier.
    pub fn unsubscribe_events(subscription: SubscriptionId) -> Self {
        Self::new("unsubscribe_events").with("subscription", subscription.0)
    }

    /// `ping`, answered by the hub with a `pong` frame.
    pub fn ping() -> Self {
        Self::new("ping")
    }

    /// The `type` tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Looks up a command-specific field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All command-specific fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

// ---------------------------------------------------------------------------
// Client → server frames
// ---------------------------------------------------------------------------

/// `{"type": "auth", "access_token": "..."}`, the first frame the client sends.
///
/// `#[serde(tag = "type", rename = "auth")]` on a struct makes serde
/// write the tag field for us.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "auth")]
pub struct AuthFrame {
    /// The credential presented to the hub.
    pub access_token: String,
}

/// Never print the token itself.
impl fmt::Debug for AuthFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthFrame")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// A correlated command on the wire: `{"id": N, "type": ..., ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandFrame {
    /// Fresh correlation id for this send.
    pub id: RequestId,
    /// The command body; flattened next to `id`.
    #[serde(flatten)]
    pub command: Command,
}

/// Anything the client writes to the socket.
///
/// `#[serde(untagged)]` serializes each variant as its inner frame; the
/// inner frames already carry their own `type` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientFrame {
    /// The authentication frame.
    Auth(AuthFrame),
    /// A correlated command.
    Command(CommandFrame),
}

// ---------------------------------------------------------------------------
// Server → client frames
// ---------------------------------------------------------------------------

/// Body of `auth_required` and `auth_ok`.
///
/// Hubs commonly announce their version here; Home Assistant-style hubs
/// call the field `ha_version`, so both spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthStatus {
    /// Server version string, if the hub sent one.
    #[serde(default, alias = "ha_version")]
    pub version: Option<String>,
}

/// Body of `auth_invalid`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthRejection {
    /// Human-readable reason from the hub.
    #[serde(default)]
    pub message: Option<String>,
}

/// A structured failure for one correlated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    /// Machine-readable code (`"not_found"`, `"unauthorized"`, ...).
    pub code: Option<String>,
    /// Human-readable message. Never empty.
    pub message: String,
}

impl RemoteFailure {
    const UNSPECIFIED: &'static str = "request failed";

    /// A failure the hub gave no details for.
    pub fn unspecified() -> Self {
        Self {
            code: None,
            message: Self::UNSPECIFIED.to_string(),
        }
    }
}

/// Hubs send either `{"code": .., "message": ..}` or a bare string.
#[derive(Deserialize)]
#[serde(untagged)]
enum FailureRepr {
    Detailed {
        #[serde(default)]
        code: Option<Value>,
        #[serde(default)]
        message: Option<String>,
    },
    Plain(String),
}

impl<'de> Deserialize<'de> for RemoteFailure {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match FailureRepr::deserialize(deserializer)? {
            FailureRepr::Detailed { code, message } => {
                let code = code.and_then(|code| match code {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                });
                // An empty message falls back to the code.
                let message = message
                    .filter(|m| !m.is_empty())
                    .or_else(|| code.clone())
                    .unwrap_or_else(|| Self::UNSPECIFIED.to_string());
                Self { code, message }
            }
            FailureRepr::Plain(message) if message.is_empty() => Self::unspecified(),
            FailureRepr::Plain(message) => Self {
                code: None,
                message,
            },
        })
    }
}

/// `result`: the answer to one correlated command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultFrame {
    /// Id of the command this answers.
    pub id: RequestId,
    /// Whether the command succeeded.
    pub success: bool,
    /// Payload on success (may be absent or `null`).
    #[serde(default)]
    pub result: Option<Value>,
    /// Failure details when `success` is false.
    #[serde(default)]
    pub error: Option<RemoteFailure>,
}

/// The decoded form of a server push: an event type tag and opaque data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// e.g. `"state_changed"`.
    pub event_type: String,
    /// Opaque payload; `null` when missing.
    #[serde(default)]
    pub data: Value,
}

/// `event`: an unsolicited push, usually tagged with a subscription id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventFrame {
    /// Id of the `subscribe_events` command this event belongs to.
    #[serde(default)]
    pub id: Option<RequestId>,
    /// The event itself.
    pub event: EventEnvelope,
}

/// `pong`: the answer to a `ping` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PongFrame {
    /// Id of the `ping` this answers.
    pub id: RequestId,
}

/// Type discriminator of an incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// `auth_required`
    AuthRequired,
    /// `auth_ok`
    AuthOk,
    /// `auth_invalid`
    AuthInvalid,
    /// `result`
    Result,
    /// `event`
    Event,
    /// `pong`
    Pong,
}

impl FrameKind {
    /// Maps a wire `type` tag to a kind, or `None` if unrecognized.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "auth_required" => Self::AuthRequired,
            "auth_ok" => Self::AuthOk,
            "auth_invalid" => Self::AuthInvalid,
            "result" => Self::Result,
            "event" => Self::Event,
            "pong" => Self::Pong,
            _ => return None,
        })
    }

    /// The wire `type` tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::AuthOk => "auth_ok",
            Self::AuthInvalid => "auth_invalid",
            Self::Result => "result",
            Self::Event => "event",
            Self::Pong => "pong",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything the hub writes to the socket, classified by its `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// The hub asks the client to authenticate.
    AuthRequired(AuthStatus),
    /// The credential was accepted.
    AuthOk(AuthStatus),
    /// The credential was rejected.
    AuthInvalid(AuthRejection),
    /// Answer to a correlated command.
    Result(ResultFrame),
    /// A pushed event.
    Event(EventFrame),
    /// Answer to a ping.
    Pong(PongFrame),
}

impl ServerFrame {
    /// Returns the frame's discriminator.
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::AuthRequired(_) => FrameKind::AuthRequired,
            Self::AuthOk(_) => FrameKind::AuthOk,
            Self::AuthInvalid(_) => FrameKind::AuthInvalid,
            Self::Result(_) => FrameKind::Result,
            Self::Event(_) => FrameKind::Event,
            Self::Pong(_) => FrameKind::Pong,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
