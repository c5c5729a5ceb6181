//! # Wire Messages
//!
//! The single message shape exchanged with the realtime server.
//!
//! ## Wire Format
//! ```json
//! { "type": "order_status_update", "data": { ... }, "timestamp": 1717000000000, "id": "..." }
//! ```
//!
//! ## Stamping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Message Lifecycle                                │
//! │                                                                         │
//! │  Message::new(kind, data)          id: None, timestamp: None           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  message.stamped()                 id: uuid v4, timestamp: now (ms)    │
//! │           │                                                             │
//! │     ┌─────┴──────┐                                                      │
//! │     ▼            ▼                                                      │
//! │  transmit     OutboundQueue                                            │
//! │                                                                         │
//! │  Existing id/timestamp values are never overwritten.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{MessageError, MessageResult};
use crate::payload::Payload;

// =============================================================================
// Message Type
// =============================================================================

/// The `type` tag of a message.
///
/// Known tags get their own variant; anything else is kept verbatim in
/// [`MessageType::Other`] so newer servers never break older clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Keep-alive probe.
    Heartbeat,
    /// Answer to a keep-alive probe.
    HeartbeatAck,
    /// Control: start receiving a channel.
    Subscribe,
    /// Control: stop receiving a channel.
    Unsubscribe,
    /// Order lifecycle change.
    OrderStatusUpdate,
    /// Cart contents changed on another device.
    CartSync,
    /// Offer created, changed, or expired.
    OfferUpdate,
    /// Support chat line.
    SupportChatMessage,
    /// Wallet balance or cashback change.
    WalletUpdate,
    /// Any tag this client does not know about.
    Other(String),
}

impl MessageType {
    /// Returns the wire tag.
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Heartbeat => "heartbeat",
            MessageType::HeartbeatAck => "heartbeat_ack",
            MessageType::Subscribe => "subscribe",
            MessageType::Unsubscribe => "unsubscribe",
            MessageType::OrderStatusUpdate => "order_status_update",
            MessageType::CartSync => "cart_sync",
            MessageType::OfferUpdate => "offer_update",
            MessageType::SupportChatMessage => "support_chat_message",
            MessageType::WalletUpdate => "wallet_update",
            MessageType::Other(tag) => tag,
        }
    }

    /// Returns true for the reserved keep-alive tags.
    pub fn is_keepalive(&self) -> bool {
        matches!(self, MessageType::Heartbeat | MessageType::HeartbeatAck)
    }
}

impl From<&str> for MessageType {
    fn from(tag: &str) -> Self {
        match tag {
            "heartbeat" => MessageType::Heartbeat,
            "heartbeat_ack" => MessageType::HeartbeatAck,
            "subscribe" => MessageType::Subscribe,
            "unsubscribe" => MessageType::Unsubscribe,
            "order_status_update" => MessageType::OrderStatusUpdate,
            "cart_sync" => MessageType::CartSync,
            "offer_update" => MessageType::OfferUpdate,
            "support_chat_message" => MessageType::SupportChatMessage,
            "wallet_update" => MessageType::WalletUpdate,
            other => MessageType::Other(other.to_string()),
        }
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        MessageType::from(tag.as_str())
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Message
// =============================================================================

/// A realtime message (inbound or outbound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Routing/type tag.
    #[serde(rename = "type")]
    pub kind: MessageType,

    /// Arbitrary payload. Use [`Message::decode`] for a typed view.
    #[serde(default)]
    pub data: Value,

    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,

    /// Message ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Message {
    /// Creates an unstamped message.
    pub fn new(kind: impl Into<MessageType>, data: Value) -> Self {
        Message {
            kind: kind.into(),
            data,
            timestamp: None,
            id: None,
        }
    }

    /// Creates an unstamped message from a typed payload.
    pub fn from_payload<P: Payload>(payload: &P) -> MessageResult<Self> {
        let data = serde_json::to_value(payload).map_err(|source| MessageError::Encode {
            kind: P::KIND.to_string(),
            source,
        })?;
        Ok(Message::new(P::KIND, data))
    }

    /// Decodes `data` into a typed payload, checking the type tag first.
    pub fn decode<P: Payload>(&self) -> MessageResult<P> {
        if self.kind != P::KIND {
            return Err(MessageError::KindMismatch {
                expected: P::KIND.to_string(),
                actual: self.kind.to_string(),
            });
        }

        serde_json::from_value(self.data.clone()).map_err(|source| MessageError::Decode {
            kind: self.kind.to_string(),
            source,
        })
    }

    /// Fills in a missing id and timestamp.
    pub fn stamped(mut self) -> Self {
        if self.id.is_none() {
            self.id = Some(Uuid::new_v4().to_string());
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(now_millis());
        }
        self
    }

    /// Returns true once both id and timestamp are present.
    pub fn is_stamped(&self) -> bool {
        self.id.is_some() && self.timestamp.is_some()
    }

    /// The `channel` field nested in `data`, if any.
    pub fn channel(&self) -> Option<&str> {
        self.data.get("channel").and_then(Value::as_str)
    }

    // =========================================================================
    // Reserved Messages
    // =========================================================================

    /// Creates a heartbeat carrying the current time.
    pub fn heartbeat() -> Self {
        let timestamp = now_millis();
        Message {
            kind: MessageType::Heartbeat,
            data: json!({ "timestamp": timestamp }),
            timestamp: Some(timestamp),
            id: None,
        }
    }

    /// Creates the acknowledgement for a received heartbeat.
    pub fn heartbeat_ack(echo_timestamp: Option<i64>) -> Self {
        let timestamp = echo_timestamp.unwrap_or_else(now_millis);
        Message::new(MessageType::HeartbeatAck, json!({ "timestamp": timestamp }))
    }

    /// Creates a `subscribe` control message.
    pub fn subscribe(channel: &str) -> Self {
        Message::new(
            MessageType::Subscribe,
            json!({ "channel": channel }),
        )
    }

    /// Creates an `unsubscribe` control message.
    pub fn unsubscribe(channel: &str) -> Self {
        Message::new(
            MessageType::Unsubscribe,
            json!({ "channel": channel }),
        )
    }

    // =========================================================================
    // JSON
    // =========================================================================

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> MessageResult<String> {
        serde_json::to_string(self).map_err(|source| MessageError::Encode {
            kind: self.kind.to_string(),
            source,
        })
    }

    /// Parses a JSON text frame.
    pub fn from_json(text: &str) -> MessageResult<Self> {
        serde_json::from_str(text).map_err(MessageError::Malformed)
    }
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
