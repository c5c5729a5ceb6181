//! # Typed Payloads
//!
//! Schema for the `data` field of the message types this client knows.
//! Each payload is tied to its type tag through [`Payload::KIND`], so
//! [`Message::decode`](crate::Message::decode) refuses to read a cart update
//! as an order update.
//!
//! | type                   | channel   | payload              |
//! |------------------------|-----------|----------------------|
//! | `order_status_update`  | `orders`  | [`OrderStatusUpdate`] |
//! | `cart_sync`            | `cart`    | [`CartSync`]          |
//! | `offer_update`         | `offers`  | [`OfferUpdate`]       |
//! | `support_chat_message` | `support` | [`SupportChatMessage`] |
//! | `wallet_update`        | `wallet`  | [`WalletUpdate`]      |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::message::MessageType;

/// A typed `data` body bound to one message type.
pub trait Payload: Serialize + DeserializeOwned {
    /// The type tag this payload travels under.
    const KIND: MessageType;
}

// =============================================================================
// Channels
// =============================================================================

/// Conventional channel names used by the convenience subscriptions.
pub mod channels {
    /// Wildcard channel; receives every dispatched message.
    pub const ALL: &str = "all";
    pub const ORDERS: &str = "orders";
    pub const CART: &str = "cart";
    pub const OFFERS: &str = "offers";
    pub const SUPPORT: &str = "support";
    pub const WALLET: &str = "wallet";
}

// =============================================================================
// Reserved Payloads
// =============================================================================

/// Body of `heartbeat` / `heartbeat_ack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub timestamp: i64,
}

impl Payload for Heartbeat {
    const KIND: MessageType = MessageType::Heartbeat;
}

// =============================================================================
// Domain Payloads
// =============================================================================

/// Order status pushed by the order service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdate {
    pub order_id: String,

    /// e.g. "confirmed", "packed", "shipped", "delivered", "cancelled".
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Payload for OrderStatusUpdate {
    const KIND: MessageType = MessageType::OrderStatusUpdate;
}

/// Cart changed on another session of the same user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSync {
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart_id: Option<String>,

    #[serde(default)]
    pub item_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cents: Option<i64>,
}

impl Payload for CartSync {
    const KIND: MessageType = MessageType::CartSync;
}

/// Offer lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferUpdate {
    pub offer_id: String,

    /// "created", "updated", or "expired".
    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Payload for OfferUpdate {
    const KIND: MessageType = MessageType::OfferUpdate;
}

/// A line in a support conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportChatMessage {
    pub ticket_id: String,
    pub sender: String,
    pub text: String,
}

impl Payload for SupportChatMessage {
    const KIND: MessageType = MessageType::SupportChatMessage;
}

/// Wallet balance change (cashback credit, redemption, refund).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletUpdate {
    pub user_id: String,
    pub balance_cents: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cashback_cents: Option<i64>,
}

impl Payload for WalletUpdate {
    const KIND: MessageType = MessageType::WalletUpdate;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;
    use serde_json::json;

    #[test]
    fn test_order_update_uses_camel_case() {
        let update = OrderStatusUpdate {
            order_id: "ord-1".into(),
            status: "packed".into(),
            message: None,
            updated_at: Some(5),
        };
        let msg = Message::from_payload(&update).unwrap();
        assert_eq!(msg.kind, MessageType::OrderStatusUpdate);
        assert_eq!(msg.data["orderId"], "ord-1");
        assert_eq!(msg.data["updatedAt"], 5);
        assert!(msg.data.get("message").is_none());
    }

    #[test]
    fn test_cart_sync_defaults() {
        let msg = Message::new("cart_sync", json!({ "userId": "u-1" }));
        let cart: CartSync = msg.decode().unwrap();
        assert_eq!(cart.item_count, 0);
        assert!(cart.cart_id.is_none());
    }

    #[test]
    fn test_wallet_update_requires_balance() {
        let msg = Message::new("wallet_update", json!({ "userId": "u-1" }));
        assert!(msg.decode::<WalletUpdate>().is_err());
    }
}
