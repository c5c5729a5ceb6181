//! # Realtime Probe
//!
//! Small CLI around [`perkstream_realtime`]: connects with the configured
//! endpoint and token, subscribes to the channels named on the command line
//! (`all` by default) and logs every event until Ctrl-C.
//!
//! ## Configuration
//! - `realtime.toml` in the platform config dir, then `PERKSTREAM_*` env vars
//! - `PERKSTREAM_TOKEN` - bearer token stored before connecting

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use perkstream_core::{channels, ConnectionEvent, EventKind, Message, MessageCallback};
use perkstream_realtime::{
    FileStore, KeyValueStore, MemoryStore, RealtimeClient, RealtimeConfig, RealtimeHandle,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = RealtimeConfig::load_or_default(None);
    if config.url().is_none() {
        anyhow::bail!("No endpoint configured; set PERKSTREAM_URL or connection.url");
    }

    let client = RealtimeClient::builder(config)
        .with_storage(open_storage())
        .spawn()
        .context("Failed to start realtime client")?;

    if let Ok(token) = std::env::var("PERKSTREAM_TOKEN") {
        client.update_auth_token(Some(&token)).await?;
    }

    log_events(&client).await?;

    let mut requested: Vec<String> = std::env::args().skip(1).collect();
    if requested.is_empty() {
        requested.push(channels::ALL.to_string());
    }
    for channel in &requested {
        let id = client.subscribe(channel, print_message()).await?;
        info!(%id, channel = %channel, "Subscribed");
    }

    client.initialize().await?;

    let mut status = client.status_changes();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    warn!("Client stopped");
                    break;
                }
                let current = status.borrow_and_update().clone();
                info!(
                    phase = %current.phase,
                    attempts = current.reconnect_attempts,
                    error = current.last_error.as_deref().unwrap_or("-"),
                    "Status changed"
                );
            }
        }
    }

    let history = client.history().await?;
    info!(
        total_connections = history.total_connections,
        last_endpoint = history.last_endpoint.as_deref().unwrap_or("-"),
        "Session summary"
    );
    client.destroy().await?;
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=perkstream_realtime=trace` - Trace the client only
/// - Default: INFO, DEBUG for the perkstream crates
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,perkstream=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn open_storage() -> Arc<dyn KeyValueStore> {
    match FileStore::open_default() {
        Ok(store) => {
            info!(path = ?store.path(), "Using file storage");
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "File storage unavailable, token and history will not persist");
            Arc::new(MemoryStore::new())
        }
    }
}

async fn log_events(client: &RealtimeHandle) -> anyhow::Result<()> {
    for kind in EventKind::ALL {
        if kind == EventKind::Message {
            continue;
        }
        client
            .on_event(kind, |event| match event {
                ConnectionEvent::Disconnected { code, reason } => {
                    info!(code, reason = %reason, "Disconnected")
                }
                ConnectionEvent::Reconnecting { attempt } => info!(attempt, "Reconnecting"),
                ConnectionEvent::Error { message } => warn!(error = %message, "Realtime error"),
                other => info!(event = %other.kind(), "Realtime event"),
            })
            .await?;
    }
    Ok(())
}

fn print_message() -> MessageCallback {
    Arc::new(|message: &Message| {
        let data = serde_json::to_string(&message.data).unwrap_or_default();
        info!(kind = %message.kind, id = ?message.id, data = %data, "Message");
    })
}
