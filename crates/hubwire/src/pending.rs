//! The pending-request table.
//!
//! Every correlated command gets a slot keyed by the link generation and
//! its request id. The slot is a `oneshot` sender; whoever removes it from
//! the table (the reader with a result, the caller's timeout, or a
//! teardown) is the one that resolves it, so each slot resolves exactly
//! once.

use std::collections::HashMap;
use std::time::Duration;

use hubwire_protocol::{RequestId, SubscriptionId};
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};
use tokio::time::Instant;

use crate::ClientError;
use crate::subscription::SubscriptionSpec;

/// What a command resolves to.
pub(crate) type Reply = Result<Value, ClientError>;

type SlotKey = (u64, RequestId);

/// Registry change applied by the reader when a command succeeds, before
/// the caller is woken. This way no event frame can slip in between the
/// hub's confirmation and the registry update.
pub(crate) enum OnSuccess {
    Subscribe(SubscriptionSpec),
    Unsubscribe(SubscriptionId),
}

/// A registered slot, owned by the table until someone takes it.
pub(crate) struct PendingRequest {
    tx: oneshot::Sender<Reply>,
    on_success: Option<OnSuccess>,
}

impl PendingRequest {
    /// Takes the registry change to apply on success, if any.
    pub(crate) fn take_on_success(&mut self) -> Option<OnSuccess> {
        self.on_success.take()
    }

    /// Resolves the slot. A caller that already gave up is ignored.
    pub(crate) fn complete(self, reply: Reply) {
        let _ = self.tx.send(reply);
    }
}

/// The caller's half of a slot.
pub(crate) struct PendingReply {
    key: SlotKey,
    rx: oneshot::Receiver<Reply>,
    deadline: Instant,
    timeout: Duration,
}

impl PendingReply {
    pub(crate) fn id(&self) -> RequestId {
        self.key.1
    }
}

#[derive(Default)]
pub(crate) struct PendingTable {
    slots: Mutex<HashMap<SlotKey, PendingRequest>>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a slot for request `id` on link `generation`, due
    /// `timeout` from now.
    pub(crate) async fn register(
        &self,
        generation: u64,
        id: RequestId,
        timeout: Duration,
        on_success: Option<OnSuccess>,
    ) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        let key = (generation, id);
        self.slots
            .lock()
            .await
            .insert(key, PendingRequest { tx, on_success });
        PendingReply {
            key,
            rx,
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    /// Removes and returns the slot for `id`, if it is still waiting.
    pub(crate) async fn take(&self, generation: u64, id: RequestId) -> Option<PendingRequest> {
        self.slots.lock().await.remove(&(generation, id))
    }

    /// Withdraws a slot without resolving it. Returns `false` if it was
    /// already taken.
    pub(crate) async fn cancel(&self, reply: &PendingReply) -> bool {
        self.slots.lock().await.remove(&reply.key).is_some()
    }

    /// Fails every waiting slot with [`ClientError::ConnectionClosed`].
    /// Returns how many there were.
    pub(crate) async fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.slots.lock().await.drain().collect();
        let count = drained.len();
        for (_, slot) in drained {
            slot.complete(Err(ClientError::ConnectionClosed));
        }
        count
    }

    pub(crate) async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Waits for the slot to resolve or its deadline to pass.
    ///
    /// On timeout the slot is withdrawn. If something else withdrew it
    /// first, its answer wins and is returned instead.
    pub(crate) async fn wait(&self, mut reply: PendingReply) -> Reply {
        match tokio::time::timeout_at(reply.deadline, &mut reply.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                if self.cancel(&reply).await {
                    Err(ClientError::RequestTimeout {
                        id: reply.id(),
                        timeout: reply.timeout,
                    })
                } else {
                    reply.rx.await.unwrap_or(Err(ClientError::ConnectionClosed))
                }
            }
        }
    }
}
