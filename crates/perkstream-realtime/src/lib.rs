//! # perkstream-realtime: Realtime Client for Perkstream
//!
//! One logical WebSocket connection per client: subscriptions routed by
//! channel, heartbeat, fixed-interval reconnect, a bounded offline queue and
//! lifecycle-aware reconnect.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Realtime Client Architecture                      │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                RealtimeClient (actor, one tokio task)            │  │
//! │  │                                                                  │  │
//! │  │  Owns status, queue, subscriptions, listeners                    │  │
//! │  │  Spawned by RealtimeClientBuilder::spawn()                       │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │   Connector /  │  │ KeyValueStore  │  │  LifecycleNotifier     │    │
//! │  │   Transport    │  │                │  │                        │    │
//! │  │                │  │ Bearer token   │  │ Active → reconnect     │    │
//! │  │ tungstenite,   │  │ Conn. history  │  │ Background → no-op     │    │
//! │  │ connect timeout│  │                │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  CALLER SIDE:                                                          │
//! │  • RealtimeHandle - cloneable, async commands, sync status()           │
//! │  • ConnectionEvent listeners - connected/disconnected/.../message      │
//! │  • Subscriptions - "all", a type tag, or data.channel                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`client`] - The actor and its builder
//! - [`handle`] - Public API
//! - [`channels`] - Typed order/cart/offer/support/wallet subscriptions
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Error types
//! - [`lifecycle`] - Foreground/background notifier
//! - [`reconnect`] - Reconnect delay policy
//! - [`storage`] - Token and history store
//! - [`transport`] - WebSocket transport
//!
//! ## Example
//! ```rust,ignore
//! let config = RealtimeConfig::load_or_default(None);
//! let realtime = RealtimeClient::builder(config)
//!     .with_storage(Arc::new(FileStore::open_default()?))
//!     .spawn()?;
//!
//! realtime
//!     .subscribe_order_updates(Some("ord-42"), |update| {
//!         println!("order {} is now {}", update.order_id, update.status);
//!     })
//!     .await?;
//! realtime.initialize().await?;
//! ```

pub mod channels;
pub mod client;
pub mod config;
pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod reconnect;
pub mod storage;
pub mod transport;

pub use client::{RealtimeClient, RealtimeClientBuilder};
pub use config::{RealtimeConfig, ReconnectStrategy};
pub use error::{RealtimeError, RealtimeResult};
pub use handle::RealtimeHandle;
pub use lifecycle::{
    AppState, LifecycleNotifier, LifecycleRegistration, ManualLifecycle, NoOpLifecycle,
};
pub use reconnect::ReconnectPolicy;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use transport::{Connector, Transport, TransportEvent, WsConnector, WsTransport};
