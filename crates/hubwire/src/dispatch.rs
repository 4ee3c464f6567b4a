//! Routing of incoming frames.
//!
//! The reader task hands every text frame from the socket to a
//! [`Dispatcher`], which decodes it and routes it:
//!
//! ```text
//! result / pong  → pending-request table (resolve the slot)
//! event          → lifecycle channel + matching subscription callback
//! auth_*         → protocol error (the handshake is already over)
//! garbage        → protocol error, keep reading
//! ```

use hubwire_protocol::{
    Codec, ProtocolError, RemoteFailure, ResultFrame, ServerFrame, SubscriptionId,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::event::{ClientEvent, EventBus};
use crate::pending::{OnSuccess, PendingTable};
use crate::subscription::SubscriptionRegistry;
use crate::ClientError;

/// Routes the frames of one link.
pub(crate) struct Dispatcher<'a, K: Codec> {
    pub(crate) codec: &'a K,
    pub(crate) pending: &'a PendingTable,
    pub(crate) subscriptions: &'a SubscriptionRegistry,
    pub(crate) events: &'a EventBus,
    /// Generation of the link this dispatcher reads from.
    pub(crate) generation: u64,
}

impl<K: Codec> Dispatcher<'_, K> {
    /// Decodes and routes one text frame. Never fails: problems with a
    /// single frame are reported and skipped.
    pub(crate) async fn handle_text(&self, text: &str) {
        match self.codec.decode(text) {
            Ok(frame) => self.handle_frame(frame).await,
            Err(e) => self.protocol_error(e),
        }
    }

    async fn handle_frame(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::Result(result) => self.handle_result(result).await,

            ServerFrame::Pong(pong) => {
                match self.pending.take(self.generation, pong.id).await {
                    Some(slot) => slot.complete(Ok(Value::Null)),
                    None => debug!(id = %pong.id, "pong for unknown request, dropping"),
                }
            }

            ServerFrame::Event(frame) => {
                let subscription = frame.id.map(SubscriptionId::from);
                self.events.emit(ClientEvent::Event {
                    subscription,
                    event: frame.event.clone(),
                });
                if let Some(id) = subscription {
                    let delivered = self
                        .subscriptions
                        .deliver(self.generation, id, frame.event)
                        .await;
                    if !delivered {
                        debug!(%id, "no callback for event");
                    }
                }
            }

            other @ (ServerFrame::AuthRequired(_)
            | ServerFrame::AuthOk(_)
            | ServerFrame::AuthInvalid(_)) => {
                self.protocol_error(ProtocolError::InvalidMessage(format!(
                    "unexpected {} frame after authentication",
                    other.kind()
                )));
            }
        }
    }

    async fn handle_result(&self, result: ResultFrame) {
        let id = result.id;
        let Some(mut slot) = self.pending.take(self.generation, id).await else {
            debug!(%id, "result for unknown request, dropping");
            return;
        };

        if !result.success {
            let failure = result.error.unwrap_or_else(RemoteFailure::unspecified);
            debug!(%id, code = ?failure.code, "command failed");
            slot.complete(Err(ClientError::Remote {
                code: failure.code,
                message: failure.message,
            }));
            return;
        }

        let value = result.result.unwrap_or(Value::Null);
        match slot.take_on_success() {
            None => {}
            Some(OnSuccess::Subscribe(spec)) => {
                let sub = SubscriptionId::from(id);
                if !self.subscriptions.insert(self.generation, sub, spec).await {
                    slot.complete(Err(ClientError::ConnectionClosed));
                    return;
                }
                debug!(%sub, "subscription active");
            }
            Some(OnSuccess::Unsubscribe(sub)) => {
                if self.subscriptions.remove(self.generation, sub).await {
                    debug!(%sub, "subscription removed");
                }
            }
        }
        slot.complete(Ok(value));
    }

    fn protocol_error(&self, error: ProtocolError) {
        warn!(generation = self.generation, error = %error, "protocol error");
        self.events.emit(ClientEvent::ProtocolError {
            message: error.to_string(),
        });
    }
}
