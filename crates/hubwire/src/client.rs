//! `HubClient`: the connection manager and public call surface.
//!
//! This is the entry point of the crate. It ties the layers together:
//! transport → handshake → link (reader + heartbeat) → pending table /
//! subscription registry.
//!
//! # Concurrency
//!
//! A `HubClient` is a cheap `Clone` around shared state. The pieces:
//!
//! - `state`: a `watch` channel holding the [`ConnectionState`]. Every
//!   transition that must not race goes through `send_if_modified`, whose
//!   closure runs under the channel's write lock.
//! - `epoch`: bumped (under that same lock) by `disconnect()`. Connect and
//!   reconnect work remembers the epoch it started in and gives up as soon
//!   as it changes.
//! - `link`: the live authenticated socket. A command registers its
//!   pending slot while holding the link lock, so a concurrent teardown
//!   always sees and fails it.
//! - `generation`: each link gets a fresh number. Reader and heartbeat
//!   tasks of an old link recognise themselves as stale by it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hubwire_protocol::{
    ClientFrame, Codec, Command, CommandFrame, EventEnvelope, JsonCodec, ProtocolError,
    RequestId, SubscriptionId,
};
use hubwire_session::{
    Backoff, ConnectionState, Handshake, HandshakeOutcome, SessionError,
};
use hubwire_transport::{Connection, Transport, TransportError, WebSocketTransport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::dispatch::Dispatcher;
use crate::event::{ClientEvent, DisconnectReason, EventBus};
use crate::pending::{OnSuccess, PendingReply, PendingTable};
use crate::subscription::{EventCallback, SubscriptionRegistry, SubscriptionSpec};
use crate::{ClientConfig, ClientError};

/// One live, authenticated socket.
struct Link<C> {
    conn: Arc<C>,
    generation: u64,
    /// Correlation ids start at 1 on every new socket.
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
}

impl<C> Link<C> {
    fn next_id(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn abort_tasks(&self) {
        self.reader.abort();
        self.abort_heartbeat();
    }

    fn abort_heartbeat(&self) {
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.abort();
        }
    }
}

/// Which of a link's own tasks noticed that it died.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LossOrigin {
    Reader,
    Heartbeat,
}

/// Shared state behind every clone of a [`HubClient`].
struct Inner<T: Transport> {
    config: ClientConfig,
    transport: T,
    codec: JsonCodec,
    handshake: Handshake,
    state: watch::Sender<ConnectionState>,
    server_version: watch::Sender<Option<String>>,
    epoch: AtomicU64,
    generation: AtomicU64,
    reconnecting: AtomicBool,
    link: Mutex<Option<Link<T::Connection>>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    pending: PendingTable,
    subscriptions: SubscriptionRegistry,
    events: EventBus,
}

/// An authenticated, reconnecting client for one hub.
///
/// ```rust,no_run
/// use hubwire::prelude::*;
///
/// # async fn run() -> Result<(), ClientError> {
/// let client = HubClient::new(ClientConfig::new("ws://hub.local:8123/api/websocket", "token"));
/// client.connect().await?;
///
/// let states = client.send(Command::new("get_states")).await?;
/// println!("{states}");
///
/// let sub = client
///     .subscribe(Some("state_changed"), |event| println!("{}", event.data))
///     .await?;
/// client.unsubscribe(sub).await?;
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
///
/// Call [`disconnect`](Self::disconnect) when done: the connection's
/// background tasks keep the client alive until then.
pub struct HubClient<T: Transport = WebSocketTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for HubClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl HubClient<WebSocketTransport> {
    /// Creates a disconnected client that talks WebSocket.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, WebSocketTransport::new())
    }
}

impl<T: Transport> HubClient<T> {
    /// Creates a disconnected client over a custom transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        let config = config.validated();
        let handshake = Handshake::new(
            config.token.clone(),
            config.auth_flow,
            config.auth_timeout,
        );
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (server_version, _) = watch::channel(None);
        let events = EventBus::new(config.event_capacity);

        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                codec: JsonCodec,
                handshake,
                state,
                server_version,
                epoch: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                reconnecting: AtomicBool::new(false),
                link: Mutex::new(None),
                reconnect_task: Mutex::new(None),
                pending: PendingTable::new(),
                subscriptions: SubscriptionRegistry::new(),
                events,
            }),
        }
    }

    // -- Lifecycle --------------------------------------------------------

    /// Opens the socket and authenticates.
    ///
    /// Resolves once the hub has accepted the token. If an automatic
    /// reconnect is already running, waits for it instead of opening a
    /// second socket.
    ///
    /// # Errors
    /// - [`ClientError::AlreadyConnected`]: already authenticated
    /// - [`ClientError::AlreadyConnecting`]: another `connect()` is running
    /// - [`ClientError::AuthenticationFailed`] / [`ClientError::AuthenticationTimeout`]
    /// - [`ClientError::Transport`]: the socket could not be opened
    /// - [`ClientError::ConnectionClosed`]: the socket closed during the
    ///   handshake, `disconnect()` was called meanwhile, or the joined
    ///   reconnect gave up
    pub async fn connect(&self) -> Result<(), ClientError> {
        let inner = &self.inner;
        loop {
            let mut state_rx = inner.state.subscribe();
            let current = *state_rx.borrow_and_update();
            match current {
                ConnectionState::Authenticated => return Err(ClientError::AlreadyConnected),
                ConnectionState::Connecting | ConnectionState::AwaitingAuth => {
                    if !inner.reconnecting.load(Ordering::SeqCst) {
                        return Err(ClientError::AlreadyConnecting);
                    }
                    debug!("reconnect in progress, joining it");
                    let outcome = state_rx
                        .wait_for(|s| {
                            matches!(
                                s,
                                ConnectionState::Authenticated | ConnectionState::Disconnected
                            )
                        })
                        .await
                        .map(|s| *s);
                    return match outcome {
                        Ok(ConnectionState::Authenticated) => Ok(()),
                        _ => Err(ClientError::ConnectionClosed),
                    };
                }
                ConnectionState::Closing => {
                    let _ = state_rx
                        .wait_for(|s| *s == ConnectionState::Disconnected)
                        .await;
                }
                ConnectionState::Disconnected => {
                    let Some(epoch) = inner.claim(ConnectionState::Disconnected, ConnectionState::Connecting)
                    else {
                        continue;
                    };
                    info!(url = %inner.config.url, "connecting");
                    let result = inner.establish(epoch).await;
                    if let Err(e) = &result {
                        debug!(error = %e, "connect failed");
                        inner.report_connect_failure(epoch, e);
                        inner.transition(epoch, ConnectionState::Disconnected);
                    }
                    return result;
                }
            }
        }
    }

    /// Closes the connection and cancels everything outstanding.
    ///
    /// Stops any reconnect or in-flight connect, fails every pending
    /// command with [`ClientError::ConnectionClosed`] and drops every
    /// subscription. Does nothing if already disconnected.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        let mut previous = ConnectionState::Disconnected;
        inner.state.send_if_modified(|state| {
            previous = *state;
            match *state {
                ConnectionState::Disconnected | ConnectionState::Closing => false,
                _ => {
                    inner.epoch.fetch_add(1, Ordering::SeqCst);
                    *state = ConnectionState::Closing;
                    true
                }
            }
        });

        match previous {
            ConnectionState::Disconnected => return,
            ConnectionState::Closing => {
                let _ = inner
                    .state
                    .subscribe()
                    .wait_for(|s| *s == ConnectionState::Disconnected)
                    .await;
                return;
            }
            _ => {}
        }

        inner.reconnecting.store(false, Ordering::SeqCst);
        if let Some(task) = inner.reconnect_task.lock().await.take() {
            task.abort();
        }

        let link = inner.link.lock().await.take();
        if let Some(link) = &link {
            link.abort_tasks();
            if let Err(e) = link.conn.close().await {
                debug!(error = %e, "close during disconnect");
            }
        }

        let failed = inner.pending.fail_all().await;
        let dropped = inner
            .subscriptions
            .retire(inner.generation.load(Ordering::SeqCst))
            .await;
        inner.server_version.send_replace(None);
        inner.state.send_replace(ConnectionState::Disconnected);

        info!(failed, subscriptions = dropped.len(), "disconnected");
        inner.events.emit(ClientEvent::Disconnected {
            reason: DisconnectReason::Requested,
            dropped_subscriptions: dropped,
        });
    }

    // -- Queries ----------------------------------------------------------

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// `true` while a socket is open (handshaking or authenticated).
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// `true` once the hub has accepted the token, until the socket goes.
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Server version announced during the last successful handshake.
    pub fn server_version(&self) -> Option<String> {
        self.inner.server_version.borrow().clone()
    }

    /// A receiver for lifecycle events from now on.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// A receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Number of commands waiting for their result.
    pub async fn pending_requests(&self) -> usize {
        self.inner.pending.len().await
    }

    /// Ids of the subscriptions active on the current connection.
    pub async fn active_subscriptions(&self) -> Vec<SubscriptionId> {
        self.inner.subscriptions.ids().await
    }

    // -- Commands ---------------------------------------------------------

    /// Sends a command and waits for its result.
    ///
    /// Returns the `result` field of the hub's answer (`null` if absent).
    ///
    /// # Errors
    /// - [`ClientError::NotConnected`]: not authenticated; nothing is sent
    /// - [`ClientError::RequestTimeout`]: no result in time
    /// - [`ClientError::Remote`]: the hub answered `success: false`
    /// - [`ClientError::ConnectionClosed`]: the connection went away first
    pub async fn send(&self, command: Command) -> Result<Value, ClientError> {
        self.inner.request(command, None).await
    }

    /// Like [`send`](Self::send), then deserializes the result into `R`.
    ///
    /// # Errors
    /// As `send`, plus [`ClientError::Protocol`] if the result does not
    /// have the shape of `R`.
    pub async fn send_as<R: DeserializeOwned>(&self, command: Command) -> Result<R, ClientError> {
        let value = self.send(command).await?;
        serde_json::from_value(value).map_err(|e| {
            ClientError::Protocol(ProtocolError::InvalidMessage(format!(
                "unexpected result shape: {e}"
            )))
        })
    }

    /// Subscribes to push events, optionally of a single type.
    ///
    /// Sends `subscribe_events`; once the hub confirms, `callback` is
    /// invoked for every event tagged with the returned id. Callbacks run
    /// on a dedicated task per subscription.
    ///
    /// Subscriptions belong to the connection they were made on. After a
    /// reconnect they are gone (see [`ClientEvent::Disconnected`]).
    pub async fn subscribe<F>(
        &self,
        event_type: Option<&str>,
        callback: F,
    ) -> Result<SubscriptionId, ClientError>
    where
        F: Fn(EventEnvelope) + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        let spec = SubscriptionSpec::new(event_type, callback);
        let (id, reply) = self
            .inner
            .submit(Command::subscribe_events(event_type), Some(OnSuccess::Subscribe(spec)))
            .await?;
        self.inner.pending.wait(reply).await?;
        let id = SubscriptionId::from(id);
        info!(%id, event_type = event_type.unwrap_or("*"), "subscribed");
        Ok(id)
    }

    /// Cancels a subscription.
    ///
    /// The id is not checked locally; whatever the hub answers is
    /// returned. After success the callback sees no further events.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), ClientError> {
        self.inner
            .request(
                Command::unsubscribe_events(id),
                Some(OnSuccess::Unsubscribe(id)),
            )
            .await?;
        info!(%id, "unsubscribed");
        Ok(())
    }

    /// Pings the hub and returns the round-trip time.
    pub async fn ping(&self) -> Result<Duration, ClientError> {
        let started = Instant::now();
        self.inner.request(Command::ping(), None).await?;
        Ok(started.elapsed())
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

impl<T: Transport> Inner<T> {
    /// Moves `from` → `to` atomically and returns the epoch it happened
    /// in, or `None` if the state was not `from`.
    fn claim(&self, from: ConnectionState, to: ConnectionState) -> Option<u64> {
        let mut epoch = None;
        self.state.send_if_modified(|state| {
            if *state != from {
                return false;
            }
            *state = to;
            epoch = Some(self.epoch.load(Ordering::SeqCst));
            true
        });
        epoch
    }

    /// Sets the state unless `disconnect()` has run since `epoch`.
    ///
    /// Leaving the connecting states also ends any running reconnect, in
    /// the same step, so a later `connect()` never mistakes its own
    /// attempt for one to join.
    fn transition(&self, epoch: u64, next: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            *state = next;
            if !next.is_connecting() {
                self.reconnecting.store(false, Ordering::SeqCst);
            }
            true
        })
    }

    fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Emits `ConnectFailed` for `error`, unless `disconnect()` caused it
    /// or the token was rejected (already reported as `AuthFailed`).
    fn report_connect_failure(&self, epoch: u64, error: &ClientError) {
        if !self.is_current(epoch) || matches!(error, ClientError::AuthenticationFailed(_)) {
            return;
        }
        self.events.emit(ClientEvent::ConnectFailed {
            error: error.to_string(),
        });
    }

    /// Opens a socket, authenticates it and installs it as the link.
    ///
    /// Expects the state to be `Connecting`. Leaves failure states to the
    /// caller.
    async fn establish(self: &Arc<Self>, epoch: u64) -> Result<(), ClientError> {
        let epoch_counter = &self.epoch;
        let mut state_rx = self.state.subscribe();
        let cancelled = async move {
            let _ = state_rx
                .wait_for(|_| epoch_counter.load(Ordering::SeqCst) != epoch)
                .await;
        };

        let (conn, outcome) = tokio::select! {
            result = self.open_and_authenticate(epoch) => result?,
            () = cancelled => {
                debug!("connect cancelled by disconnect");
                return Err(ClientError::ConnectionClosed);
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let conn_id = conn.id();
        {
            let mut link = self.link.lock().await;
            if !self.transition(epoch, ConnectionState::Authenticated) {
                drop(link);
                let _ = conn.close().await;
                return Err(ClientError::ConnectionClosed);
            }
            self.server_version
                .send_replace(outcome.server_version.clone());

            let reader = self.spawn_reader(Arc::clone(&conn), generation);
            let heartbeat = self
                .config
                .heartbeat_interval
                .map(|interval| self.spawn_heartbeat(generation, interval));
            *link = Some(Link {
                conn,
                generation,
                next_id: AtomicU64::new(1),
                reader,
                heartbeat,
            });
        }

        info!(%conn_id, generation, version = ?outcome.server_version, "connection ready");
        self.events.emit(ClientEvent::Authenticated {
            server_version: outcome.server_version,
        });
        Ok(())
    }

    async fn open_and_authenticate(
        &self,
        epoch: u64,
    ) -> Result<(Arc<T::Connection>, HandshakeOutcome), ClientError> {
        let url = &self.config.url;
        let conn = match tokio::time::timeout(
            self.config.connect_timeout,
            self.transport.connect(url),
        )
        .await
        {
            Ok(result) => Arc::new(result?),
            Err(_) => {
                return Err(ClientError::Transport(TransportError::ConnectFailed {
                    url: url.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connect timed out",
                    ),
                }));
            }
        };

        let conn_id = conn.id();
        if !self.transition(epoch, ConnectionState::AwaitingAuth) {
            let _ = conn.close().await;
            return Err(ClientError::ConnectionClosed);
        }
        debug!(%conn_id, "socket open, authenticating");
        self.events.emit(ClientEvent::Connected { connection: conn_id });

        let events = &self.events;
        let outcome = self
            .handshake
            .run(conn.as_ref(), &self.codec, |e| {
                warn!(%conn_id, error = %e, "protocol error during handshake");
                events.emit(ClientEvent::ProtocolError {
                    message: e.to_string(),
                });
            })
            .await;

        match outcome {
            Ok(outcome) => Ok((conn, outcome)),
            Err(SessionError::AuthFailed(message)) => {
                warn!(%conn_id, %message, "hub rejected the access token");
                self.events.emit(ClientEvent::AuthFailed {
                    message: message.clone(),
                });
                Err(ClientError::AuthenticationFailed(message))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Encodes `command`, registers its slot and transmits it.
    async fn submit(
        &self,
        command: Command,
        on_success: Option<OnSuccess>,
    ) -> Result<(RequestId, PendingReply), ClientError> {
        let kind = command.kind().to_owned();
        let (conn, text, reply) = {
            let guard = self.link.lock().await;
            let link = match guard.as_ref() {
                Some(link) if self.is_authenticated() => link,
                _ => return Err(ClientError::NotConnected),
            };
            let id = link.next_id();
            let text = self
                .codec
                .encode(&ClientFrame::Command(CommandFrame { id, command }))?;
            let reply = self
                .pending
                .register(link.generation, id, self.config.request_timeout, on_success)
                .await;
            (Arc::clone(&link.conn), text, reply)
        };

        let id = reply.id();
        debug!(%id, %kind, "sending command");
        if let Err(e) = conn.send(&text).await {
            self.pending.cancel(&reply).await;
            return Err(e.into());
        }
        Ok((id, reply))
    }

    async fn request(
        &self,
        command: Command,
        on_success: Option<OnSuccess>,
    ) -> Result<Value, ClientError> {
        let (_, reply) = self.submit(command, on_success).await?;
        self.pending.wait(reply).await
    }

    fn spawn_reader(self: &Arc<Self>, conn: Arc<T::Connection>, generation: u64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let reason = {
                let dispatcher = Dispatcher {
                    codec: &inner.codec,
                    pending: &inner.pending,
                    subscriptions: &inner.subscriptions,
                    events: &inner.events,
                    generation,
                };
                loop {
                    match conn.recv().await {
                        Ok(Some(text)) => dispatcher.handle_text(&text).await,
                        Ok(None) => break DisconnectReason::ServerClosed,
                        Err(e) => break DisconnectReason::Transport(e.to_string()),
                    }
                }
            };
            inner
                .connection_lost(generation, reason, LossOrigin::Reader)
                .await;
        })
    }

    fn spawn_heartbeat(self: &Arc<Self>, generation: u64, interval: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if inner.generation.load(Ordering::SeqCst) != generation {
                    break;
                }
                let started = Instant::now();
                match inner.request(Command::ping(), None).await {
                    Ok(_) => trace!(generation, rtt = ?started.elapsed(), "heartbeat"),
                    Err(ClientError::RequestTimeout { .. }) => {
                        warn!(generation, "heartbeat unanswered, dropping connection");
                        inner
                            .connection_lost(
                                generation,
                                DisconnectReason::HeartbeatTimeout,
                                LossOrigin::Heartbeat,
                            )
                            .await;
                        break;
                    }
                    Err(e) => {
                        debug!(generation, error = %e, "heartbeat stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Tears down link `generation` after it failed on its own.
    ///
    /// A stale generation, or a `disconnect()` that got there first, makes
    /// this a no-op.
    async fn connection_lost(
        self: &Arc<Self>,
        generation: u64,
        reason: DisconnectReason,
        origin: LossOrigin,
    ) {
        let reconnect = self.config.reconnect.enabled;
        let next = if reconnect {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        };

        let (link, epoch) = {
            let mut guard = self.link.lock().await;
            if guard.as_ref().map(|link| link.generation) != Some(generation) {
                debug!(generation, "stale connection ended");
                return;
            }
            let mut epoch = None;
            self.state.send_if_modified(|state| {
                if *state != ConnectionState::Authenticated {
                    return false;
                }
                *state = next;
                self.reconnecting.store(reconnect, Ordering::SeqCst);
                epoch = Some(self.epoch.load(Ordering::SeqCst));
                true
            });
            let Some(epoch) = epoch else {
                // disconnect() owns the teardown
                return;
            };
            (guard.take(), epoch)
        };

        if let Some(link) = link {
            // Never abort the task we are running on.
            match origin {
                LossOrigin::Reader => link.abort_heartbeat(),
                LossOrigin::Heartbeat => link.reader.abort(),
            }
            if let Err(e) = link.conn.close().await {
                debug!(generation, error = %e, "close after connection loss");
            }
        }
        let failed = self.pending.fail_all().await;
        let dropped = self.subscriptions.retire(generation).await;
        self.server_version.send_replace(None);

        warn!(generation, %reason, failed, subscriptions = dropped.len(), "connection lost");
        self.events.emit(ClientEvent::Disconnected {
            reason,
            dropped_subscriptions: dropped,
        });

        if reconnect {
            self.spawn_reconnect(epoch).await;
        }
    }

    async fn spawn_reconnect(self: &Arc<Self>, epoch: u64) {
        let inner = Arc::clone(self);
        // Boxed: the reconnect future contains `establish`, which spawns
        // the reader that can end up here again.
        let task: Pin<Box<dyn Future<Output = ()> + Send>> =
            Box::pin(async move { inner.reconnect_loop(epoch).await });
        let handle = tokio::spawn(task);
        *self.reconnect_task.lock().await = Some(handle);
    }

    async fn reconnect_loop(self: Arc<Self>, epoch: u64) {
        let mut backoff = Backoff::new(self.config.reconnect.clone());

        while let Some(delay) = backoff.next_delay() {
            if !self.is_current(epoch) {
                return;
            }
            let attempt = backoff.attempt();
            info!(attempt, ?delay, "reconnecting");
            self.events.emit(ClientEvent::Reconnecting { attempt, delay });
            tokio::time::sleep(delay).await;

            if !self.transition(epoch, ConnectionState::Connecting) {
                return;
            }
            match self.establish(epoch).await {
                Ok(()) => {
                    info!(attempt, "reconnected");
                    return;
                }
                Err(ClientError::AuthenticationFailed(_)) => {
                    warn!(attempt, "access token rejected, giving up");
                    break;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "reconnect attempt failed");
                    self.report_connect_failure(epoch, &e);
                    // The failed attempt may have reached AwaitingAuth.
                    if !self.transition(epoch, ConnectionState::Connecting) {
                        return;
                    }
                }
            }
        }

        if self.transition(epoch, ConnectionState::Disconnected) {
            let attempts = backoff.attempt();
            warn!(attempts, "giving up on reconnecting");
            self.events.emit(ClientEvent::ReconnectFailed { attempts });
        }
    }
}
