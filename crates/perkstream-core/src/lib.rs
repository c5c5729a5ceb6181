//! # perkstream-core: Pure Realtime Logic
//!
//! Everything the realtime client decides without touching the network:
//! the wire message model, routing of inbound messages to subscriptions,
//! the offline queue policy and the listener table.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Perkstream Realtime Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           App screens (orders, cart, wallet, support)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ RealtimeHandle                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          perkstream-realtime (actor, socket, timers)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ perkstream-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌──────────┐ ┌──────────────┐ ┌──────────────┐   │   │
//! │  │  │ message  │ │  queue   │ │ subscription │ │ event/status │   │   │
//! │  │  │ payload  │ │ (bounded)│ │  (routing)   │ │ (listeners)  │   │   │
//! │  │  └──────────┘ └──────────┘ └──────────────┘ └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO TIMERS • NO LOGGING                               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`message`] - `Message` envelope and `MessageType` tags
//! - [`payload`] - Typed `data` bodies and channel names
//! - [`queue`] - Drop-oldest outbound queue
//! - [`subscription`] - Subscriptions, matching and dispatch
//! - [`event`] - Connection events and the listener table
//! - [`status`] - Connection status snapshot and history
//! - [`error`] - Message encode/decode errors
//!
//! Side effects that need reporting (an evicted message, a panicking
//! callback) come back as return values; the caller decides how to log them.
//!
//! ## Example Usage
//!
//! ```rust
//! use perkstream_core::{Message, OutboundQueue};
//! use serde_json::json;
//!
//! let mut queue = OutboundQueue::new(2);
//! queue.push(Message::new("cart_sync", json!({ "userId": "u-1" })).stamped());
//! queue.push(Message::new("cart_sync", json!({ "userId": "u-2" })).stamped());
//!
//! let evicted = queue.push(Message::new("cart_sync", json!({ "userId": "u-3" })).stamped());
//! assert_eq!(evicted.unwrap().data["userId"], "u-1");
//! assert_eq!(queue.len(), 2);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod event;
pub mod message;
pub mod payload;
pub mod queue;
pub mod status;
pub mod subscription;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{MessageError, MessageResult};
pub use event::{ConnectionEvent, EventKind, EventListener, EventListeners, ListenerFailure};
pub use message::{now_millis, Message, MessageType};
pub use payload::{
    channels, CartSync, Heartbeat, OfferUpdate, OrderStatusUpdate, Payload,
    SupportChatMessage, WalletUpdate,
};
pub use queue::{OutboundQueue, DEFAULT_QUEUE_CAPACITY};
pub use status::{ConnectionHistory, ConnectionPhase, ConnectionStatus};
pub use subscription::{
    CallbackFailure, DispatchOutcome, FailureStage, MessageCallback, MessageFilter,
    Subscription, SubscriptionId, SubscriptionRegistry,
};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// WebSocket close code for an intentional shutdown. Never triggers a reconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Storage key holding the bearer token.
pub const AUTH_TOKEN_KEY: &str = "perkstream.auth_token";

/// Storage key holding the serialized [`ConnectionHistory`].
pub const CONNECTION_HISTORY_KEY: &str = "perkstream.connection_history";
