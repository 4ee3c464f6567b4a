//! Integration tests for connection loss: automatic reconnect with
//! backoff, giving up, joining a running reconnect, and the heartbeat.

mod common;

use std::time::Duration;

use common::{MockHub, STEP, connect, init_tracing, wait_for_event};
use hubwire::prelude::*;
use serde_json::json;

/// Fast, deterministic reconnects for tests.
fn quick_reconnect(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        enabled: true,
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        max_attempts,
        jitter: Duration::ZERO,
    }
}

fn is_disconnected(event: &ClientEvent) -> bool {
    matches!(event, ClientEvent::Disconnected { .. })
}

#[tokio::test]
async fn test_server_close_triggers_reconnect_and_reauthentication() {
    init_tracing();
    let mut hub = MockHub::start().await;
    let client = HubClient::new(hub.config().with_reconnect(quick_reconnect(5)));
    let mut events = client.events();
    let socket = connect(&client, &mut hub).await;

    socket.close().await;

    let ClientEvent::Disconnected { reason, .. } =
        wait_for_event(&mut events, is_disconnected).await
    else {
        unreachable!()
    };
    assert!(
        matches!(
            reason,
            DisconnectReason::ServerClosed | DisconnectReason::Transport(_)
        ),
        "got {reason:?}"
    );
    assert!(!client.is_authenticated());

    wait_for_event(&mut events, |e| {
        matches!(e, ClientEvent::Reconnecting { attempt: 1, .. })
    })
    .await;

    // The reconnect runs the full handshake again.
    let mut socket = hub.accept().await;
    socket.accept_auth().await;
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Authenticated { .. })).await;
    assert!(client.is_authenticated());

    // Correlation ids restart on the new socket.
    let sending = tokio::spawn({
        let client = client.clone();
        async move { client.send(Command::new("get_states")).await }
    });
    let (id, _) = socket.recv_command().await;
    assert_eq!(id, 1);
    socket.reply(id, json!([])).await;
    sending.await.unwrap().unwrap();

    client.disconnect().await;
}

#[tokio::test]
async fn test_connection_loss_fails_pending_and_drops_subscriptions() {
    let mut hub = MockHub::start().await;
    let client = HubClient::new(hub.config().with_reconnect(quick_reconnect(5)));
    let mut events = client.events();
    let mut socket = connect(&client, &mut hub).await;

    let subscribing = tokio::spawn({
        let client = client.clone();
        async move { client.subscribe(Some("state_changed"), |_| {}).await }
    });
    socket.confirm_subscribe(Some("state_changed")).await;
    let sub = subscribing.await.unwrap().unwrap();

    let sending = tokio::spawn({
        let client = client.clone();
        async move { client.send(Command::new("get_states")).await }
    });
    socket.recv_command().await;
    socket.close().await;

    assert!(matches!(
        sending.await.unwrap(),
        Err(ClientError::ConnectionClosed)
    ));
    let ClientEvent::Disconnected {
        dropped_subscriptions,
        ..
    } = wait_for_event(&mut events, is_disconnected).await
    else {
        unreachable!()
    };
    assert_eq!(dropped_subscriptions, vec![sub]);

    // Subscriptions are not replayed on the new connection.
    let mut socket = hub.accept().await;
    socket.accept_auth().await;
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Authenticated { .. })).await;
    assert!(client.active_subscriptions().await.is_empty());
    assert!(socket.silent_for(Duration::from_millis(100)).await);

    client.disconnect().await;
}

#[tokio::test]
async fn test_resubscribe_after_reconnect_delivers_events_again() {
    let mut hub = MockHub::start().await;
    let client = HubClient::new(hub.config().with_reconnect(quick_reconnect(5)));
    let mut events = client.events();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let socket = connect(&client, &mut hub).await;

    socket.close().await;
    let mut socket = hub.accept().await;
    socket.accept_auth().await;
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Authenticated { .. })).await;

    // Subscribing again on the new connection is up to the caller.
    let subscribing = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .subscribe(Some("state_changed"), move |event| {
                    let _ = tx.send(event.event_type);
                })
                .await
        }
    });
    let id = socket.confirm_subscribe(Some("state_changed")).await;
    subscribing.await.unwrap().unwrap();

    socket
        .push_event(id, "state_changed", json!({"entity_id": "light.desk"}))
        .await;
    let delivered = tokio::time::timeout(STEP, rx.recv()).await.unwrap();
    assert_eq!(delivered.as_deref(), Some("state_changed"));

    client.disconnect().await;
}

#[tokio::test]
async fn test_reconnect_gives_up_after_max_attempts() {
    let mut hub = MockHub::start().await;
    let client = HubClient::new(hub.config().with_reconnect(quick_reconnect(2)));
    let mut events = client.events();
    let socket = connect(&client, &mut hub).await;

    hub.stop_listening();
    tokio::time::sleep(Duration::from_millis(50)).await;
    socket.close().await;

    wait_for_event(&mut events, |e| {
        matches!(e, ClientEvent::Reconnecting { attempt: 2, .. })
    })
    .await;
    assert_eq!(
        wait_for_event(&mut events, |e| matches!(e, ClientEvent::ReconnectFailed { .. })).await,
        ClientEvent::ReconnectFailed { attempts: 2 }
    );
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_reconnect_stops_when_token_is_rejected() {
    let mut hub = MockHub::start().await;
    let client = HubClient::new(hub.config().with_reconnect(quick_reconnect(5)));
    let mut events = client.events();
    let socket = connect(&client, &mut hub).await;

    socket.close().await;

    let mut socket = hub.accept().await;
    socket.expect_auth().await;
    socket
        .send_json(json!({"type": "auth_invalid", "message": "token revoked"}))
        .await;

    wait_for_event(&mut events, |e| matches!(e, ClientEvent::AuthFailed { .. })).await;
    assert_eq!(
        wait_for_event(&mut events, |e| matches!(e, ClientEvent::ReconnectFailed { .. })).await,
        ClientEvent::ReconnectFailed { attempts: 1 }
    );
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(hub.no_connection_within(Duration::from_millis(200)).await);
}

#[tokio::test]
async fn test_failed_reconnect_attempt_is_not_reported_as_connected() {
    let mut hub = MockHub::start().await;
    let reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(1),
        ..quick_reconnect(5)
    };
    let client = HubClient::new(hub.config().with_reconnect(reconnect));
    let mut events = client.events();
    let mut states = client.state_changes();
    let socket = connect(&client, &mut hub).await;

    socket.close().await;

    // Attempt 1 opens a socket that the hub closes mid-handshake.
    let mut socket = hub.accept().await;
    socket.expect_auth().await;
    socket.close().await;

    let ClientEvent::ConnectFailed { error } =
        wait_for_event(&mut events, |e| matches!(e, ClientEvent::ConnectFailed { .. })).await
    else {
        unreachable!()
    };
    assert_eq!(error, ClientError::ConnectionClosed.to_string());
    wait_for_event(&mut events, |e| {
        matches!(e, ClientEvent::Reconnecting { attempt: 2, .. })
    })
    .await;

    // Waiting out the backoff, no socket is open.
    tokio::time::timeout(STEP, states.wait_for(|s| *s == ConnectionState::Connecting))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert!(!client.is_connected());

    client.disconnect().await;
}

#[tokio::test]
async fn test_connect_after_abandoned_reconnect_does_not_join_it() {
    let mut hub = MockHub::start().await;
    let client = HubClient::new(hub.config().with_reconnect(quick_reconnect(5)));
    let mut events = client.events();
    let socket = connect(&client, &mut hub).await;

    socket.close().await;
    let mut socket = hub.accept().await;
    socket.expect_auth().await;
    socket.send_json(json!({"type": "auth_invalid"})).await;
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::ReconnectFailed { .. })).await;

    // A caller-initiated connect is not a reconnect to join.
    let first = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    let mut socket = hub.accept().await;
    socket.expect_auth().await;
    assert!(matches!(
        client.connect().await,
        Err(ClientError::AlreadyConnecting)
    ));

    socket
        .send_json(json!({"type": "auth_ok", "ha_version": "2024.6.0"}))
        .await;
    first.await.unwrap().unwrap();
    assert!(client.is_authenticated());
    client.disconnect().await;
}

#[tokio::test]
async fn test_connect_during_reconnect_joins_it() {
    let mut hub = MockHub::start().await;
    let client = HubClient::new(hub.config().with_reconnect(quick_reconnect(5)));
    let mut events = client.events();
    let socket = connect(&client, &mut hub).await;

    socket.close().await;
    wait_for_event(&mut events, is_disconnected).await;

    let joining = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });

    let mut socket = hub.accept().await;
    socket.accept_auth().await;

    tokio::time::timeout(STEP, joining)
        .await
        .unwrap()
        .unwrap()
        .expect("joined connect should succeed");
    assert!(client.is_authenticated());
    assert!(
        hub.no_connection_within(Duration::from_millis(200)).await,
        "only one socket is opened"
    );
    client.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_cancels_pending_reconnect() {
    let mut hub = MockHub::start().await;
    let reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(200),
        ..quick_reconnect(5)
    };
    let client = HubClient::new(hub.config().with_reconnect(reconnect));
    let mut events = client.events();
    let socket = connect(&client, &mut hub).await;

    socket.close().await;
    wait_for_event(&mut events, is_disconnected).await;
    assert_eq!(client.state(), ConnectionState::Connecting);

    client.disconnect().await;

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(hub.no_connection_within(Duration::from_millis(400)).await);
}

#[tokio::test]
async fn test_no_reconnect_when_disabled() {
    let mut hub = MockHub::start().await;
    let client = HubClient::new(hub.config());
    let mut events = client.events();
    let socket = connect(&client, &mut hub).await;

    socket.close().await;

    wait_for_event(&mut events, is_disconnected).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(hub.no_connection_within(Duration::from_millis(200)).await);
}

#[tokio::test]
async fn test_unanswered_heartbeat_drops_connection() {
    let mut hub = MockHub::start().await;
    let client = HubClient::new(
        hub.config()
            .with_heartbeat(Duration::from_millis(50))
            .with_request_timeout(Duration::from_millis(100)),
    );
    let mut events = client.events();
    let mut socket = connect(&client, &mut hub).await;

    let (_, frame) = socket.recv_command().await;
    assert_eq!(frame["type"], "ping");

    let ClientEvent::Disconnected { reason, .. } =
        wait_for_event(&mut events, is_disconnected).await
    else {
        unreachable!()
    };
    assert_eq!(reason, DisconnectReason::HeartbeatTimeout);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_answered_heartbeat_keeps_connection() {
    let mut hub = MockHub::start().await;
    let client = HubClient::new(hub.config().with_heartbeat(Duration::from_millis(50)));
    let mut socket = connect(&client, &mut hub).await;

    for _ in 0..3 {
        let (id, frame) = socket.recv_command().await;
        assert_eq!(frame["type"], "ping");
        socket.send_json(json!({"id": id, "type": "pong"})).await;
    }

    assert!(client.is_authenticated());
    client.disconnect().await;
}
