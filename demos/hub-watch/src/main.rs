//! hub-watch: connects to a hub and prints pushed events until Ctrl-C.
//!
//! ```text
//! HUBWIRE_URL=ws://hub.local:8123/api/websocket \
//! HUBWIRE_TOKEN=... \
//! HUBWIRE_EVENT_TYPE=state_changed \
//! cargo run -p hub-watch
//! ```

use std::time::Duration;

use hubwire::prelude::*;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "ws://127.0.0.1:8123/api/websocket";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn config_from_env() -> Result<(ClientConfig, Option<String>), String> {
    let url = std::env::var("HUBWIRE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let token = std::env::var("HUBWIRE_TOKEN")
        .map_err(|_| "HUBWIRE_TOKEN must be set to a long-lived access token".to_string())?;
    let event_type = std::env::var("HUBWIRE_EVENT_TYPE")
        .ok()
        .filter(|s| !s.is_empty());

    let config = ClientConfig::new(url, token).with_heartbeat(Duration::from_secs(30));
    Ok((config, event_type))
}

// ---------------------------------------------------------------------------
// Watching
// ---------------------------------------------------------------------------

/// Subscribes on the current connection and prints every event.
async fn watch(client: HubClient, event_type: Option<String>) {
    let result = client
        .subscribe(event_type.as_deref(), |event| {
            println!("{} {}", event.event_type, event.data);
        })
        .await;
    match result {
        Ok(subscription) => {
            info!(%subscription, event_type = event_type.as_deref().unwrap_or("*"), "watching");
        }
        Err(e) => warn!(error = %e, "subscribe failed"),
    }
}

/// Logs lifecycle events and subscribes again after every (re)connect,
/// since subscriptions do not survive the socket they were made on.
fn follow_lifecycle(client: &HubClient, event_type: Option<String>) {
    let mut events = client.events();
    let client = client.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ClientEvent::Event { .. }) => {}
                Ok(ClientEvent::Authenticated { server_version }) => {
                    info!(version = server_version.as_deref().unwrap_or("unknown"), "authenticated");
                    tokio::spawn(watch(client.clone(), event_type.clone()));
                }
                Ok(ClientEvent::Disconnected { reason, dropped_subscriptions }) => {
                    warn!(%reason, dropped = dropped_subscriptions.len(), "disconnected");
                }
                Ok(ClientEvent::Reconnecting { attempt, delay }) => {
                    info!(attempt, ?delay, "reconnecting");
                }
                Ok(ClientEvent::ReconnectFailed { attempts }) => {
                    warn!(attempts, "gave up reconnecting, no longer watching");
                }
                Ok(event) => info!(?event, "client event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, event_type) = config_from_env()?;
    info!(url = %config.url, "starting hub-watch");

    let client = HubClient::new(config);
    follow_lifecycle(&client, event_type);
    client.connect().await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    client.disconnect().await;
    Ok(())
}
