//! The subscription registry.
//!
//! Maps each [`SubscriptionId`] to the callback that wants its events.
//! Every subscription owns a small delivery task fed by an unbounded
//! channel, so the reader only ever does a non-blocking `send` and the
//! callback runs with no registry lock held. A slow callback delays its
//! own events and nobody else's.

use std::collections::HashMap;
use std::sync::Arc;

use hubwire_protocol::{EventEnvelope, SubscriptionId};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

/// A subscriber's event handler.
pub type EventCallback = Arc<dyn Fn(EventEnvelope) + Send + Sync>;

/// What a `subscribe` call asks to install once the hub confirms it.
#[derive(Clone)]
pub(crate) struct SubscriptionSpec {
    pub(crate) filter: Option<String>,
    pub(crate) callback: EventCallback,
}

impl SubscriptionSpec {
    pub(crate) fn new(filter: Option<&str>, callback: EventCallback) -> Self {
        Self {
            filter: filter.map(str::to_owned),
            callback,
        }
    }
}

struct Entry {
    /// Link generation the subscription was created on.
    generation: u64,
    filter: Option<String>,
    tx: mpsc::UnboundedSender<EventEnvelope>,
}

impl Entry {
    fn admits(&self, event: &EventEnvelope) -> bool {
        self.filter
            .as_deref()
            .is_none_or(|wanted| wanted == event.event_type)
    }
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<SubscriptionId, Entry>,
    /// Generations up to and including this one are gone. Late inserts
    /// for them are refused.
    retired_through: u64,
}

/// All active subscriptions of one client.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    state: Mutex<RegistryState>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Installs a subscription confirmed on link `generation`.
    ///
    /// Returns `false` (and installs nothing) if that link has already
    /// been torn down.
    pub(crate) async fn insert(
        &self,
        generation: u64,
        id: SubscriptionId,
        spec: SubscriptionSpec,
    ) -> bool {
        let mut state = self.state.lock().await;
        if generation <= state.retired_through {
            debug!(%id, generation, "subscription confirmed on a dead link, discarding");
            return false;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<EventEnvelope>();
        let callback = spec.callback;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                callback(event);
            }
            debug!(%id, "subscription delivery stopped");
        });

        let entry = Entry {
            generation,
            filter: spec.filter,
            tx,
        };
        if state.entries.insert(id, entry).is_some() {
            warn!(%id, "replaced an existing subscription with the same id");
        }
        true
    }

    /// Removes a subscription. Its callback is not invoked for events
    /// delivered after this returns.
    pub(crate) async fn remove(&self, generation: u64, id: SubscriptionId) -> bool {
        let mut state = self.state.lock().await;
        match state.entries.get(&id) {
            Some(entry) if entry.generation == generation => {
                state.entries.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Hands `event` to the matching subscription's delivery task.
    ///
    /// Returns `true` if a callback will see it.
    pub(crate) async fn deliver(
        &self,
        generation: u64,
        id: SubscriptionId,
        event: EventEnvelope,
    ) -> bool {
        let state = self.state.lock().await;
        let Some(entry) = state.entries.get(&id) else {
            return false;
        };
        if entry.generation != generation || !entry.admits(&event) {
            return false;
        }
        entry.tx.send(event).is_ok()
    }

    /// Drops every subscription made on `generation` or earlier and
    /// returns their ids in ascending order.
    pub(crate) async fn retire(&self, generation: u64) -> Vec<SubscriptionId> {
        let mut state = self.state.lock().await;
        state.retired_through = state.retired_through.max(generation);
        let mut dropped: Vec<SubscriptionId> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.generation <= generation)
            .map(|(id, _)| *id)
            .collect();
        for id in &dropped {
            state.entries.remove(id);
        }
        dropped.sort_unstable_by_key(|id| id.0);
        dropped
    }

    /// Ids of all active subscriptions, ascending.
    pub(crate) async fn ids(&self) -> Vec<SubscriptionId> {
        let state = self.state.lock().await;
        let mut ids: Vec<_> = state.entries.keys().copied().collect();
        ids.sort_unstable_by_key(|id| id.0);
        ids
    }
}
