//! A scripted in-process hub for integration tests.
//!
//! The hub accepts WebSocket connections on a random local port and hands
//! every accepted socket to the test, which then plays the server side
//! frame by frame.

#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use hubwire::prelude::*;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

/// How long any single step of a test may take before it fails.
pub const STEP: Duration = Duration::from_secs(5);

pub const TOKEN: &str = "tok";

/// Routes client logs to the test output. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hubwire=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// =========================================================================
// Hub
// =========================================================================

pub struct MockHub {
    url: String,
    sockets: mpsc::UnboundedReceiver<HubSocket>,
    acceptor: JoinHandle<()>,
}

impl MockHub {
    /// Binds to `127.0.0.1:0` and starts accepting.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("should have local addr");
        let (tx, sockets) = mpsc::unbounded_channel();

        let acceptor = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                        let _ = tx.send(HubSocket { ws });
                    }
                });
            }
        });

        Self {
            url: format!("ws://{addr}"),
            sockets,
            acceptor,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// A config for this hub with short timeouts and no reconnect.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.url.clone(), TOKEN)
            .with_auth_timeout(Duration::from_secs(2))
            .with_request_timeout(Duration::from_secs(2))
            .with_reconnect(ReconnectConfig::disabled())
    }

    /// Waits for the next client socket.
    pub async fn accept(&mut self) -> HubSocket {
        tokio::time::timeout(STEP, self.sockets.recv())
            .await
            .expect("client should connect in time")
            .expect("acceptor is running")
    }

    /// `true` if no client socket arrives within `window`.
    pub async fn no_connection_within(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.sockets.recv())
            .await
            .is_err()
    }

    /// Stops listening. New connection attempts are refused.
    pub fn stop_listening(&self) {
        self.acceptor.abort();
    }
}

// =========================================================================
// One accepted socket, server side
// =========================================================================

pub struct HubSocket {
    ws: WebSocketStream<TcpStream>,
}

impl HubSocket {
    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("hub send should succeed");
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    /// Next JSON frame from the client.
    pub async fn recv_json(&mut self) -> Value {
        tokio::time::timeout(STEP, async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return serde_json::from_str(text.as_str())
                            .expect("client sent valid JSON");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                    other => panic!("expected a text frame, got {other:?}"),
                }
            }
        })
        .await
        .expect("client should send a frame in time")
    }

    /// `true` once the client closed the socket (or it dropped).
    pub async fn closed_by_client(&mut self) -> bool {
        tokio::time::timeout(STEP, async {
            loop {
                match self.ws.next().await {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return true,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await
        .unwrap_or(false)
    }

    /// `true` if the client sends nothing within `window`.
    pub async fn silent_for(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.ws.next()).await.is_err()
    }

    /// Reads the client's `auth` frame and returns its token.
    pub async fn expect_auth(&mut self) -> String {
        let frame = self.recv_json().await;
        assert_eq!(frame["type"], "auth", "first frame should be auth: {frame}");
        frame["access_token"]
            .as_str()
            .expect("auth carries a token")
            .to_string()
    }

    /// Eager handshake, accepted.
    pub async fn accept_auth(&mut self) {
        let token = self.expect_auth().await;
        assert_eq!(token, TOKEN);
        self.send_json(json!({"type": "auth_ok", "ha_version": "2024.6.0"}))
            .await;
    }

    /// Reads one command and returns `(id, frame)`.
    pub async fn recv_command(&mut self) -> (u64, Value) {
        let frame = self.recv_json().await;
        let id = frame["id"].as_u64().expect("command carries an id");
        (id, frame)
    }

    pub async fn reply(&mut self, id: u64, result: Value) {
        self.send_json(json!({"id": id, "type": "result", "success": true, "result": result}))
            .await;
    }

    /// Answers a `subscribe_events` command and returns its id.
    pub async fn confirm_subscribe(&mut self, event_type: Option<&str>) -> u64 {
        let (id, frame) = self.recv_command().await;
        assert_eq!(frame["type"], "subscribe_events");
        match event_type {
            Some(event_type) => assert_eq!(frame["event_type"], event_type),
            None => assert!(frame.get("event_type").is_none()),
        }
        self.reply(id, Value::Null).await;
        id
    }

    pub async fn push_event(&mut self, id: u64, event_type: &str, data: Value) {
        self.send_json(json!({
            "id": id,
            "type": "event",
            "event": {"event_type": event_type, "data": data}
        }))
        .await;
    }

    /// Sends a close frame.
    pub async fn close(mut self) {
        let _ = self.ws.send(Message::Close(None)).await;
    }
}

// =========================================================================
// Client helpers
// =========================================================================

/// Connects `client` against `hub`, accepting the handshake.
pub async fn connect(client: &HubClient, hub: &mut MockHub) -> HubSocket {
    let connecting = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    let mut socket = hub.accept().await;
    socket.accept_auth().await;
    connecting
        .await
        .expect("connect task should not panic")
        .expect("connect should succeed");
    socket
}

/// Waits for the first event matching `pred`, skipping others.
pub async fn wait_for_event(
    rx: &mut broadcast::Receiver<ClientEvent>,
    pred: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    tokio::time::timeout(STEP, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("expected event should arrive in time")
}
