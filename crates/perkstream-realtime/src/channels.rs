//! # Domain Subscriptions
//!
//! Typed wrappers over [`RealtimeHandle::subscribe_filtered`] for the
//! channels the app screens use.
//!
//! | method | channel | type | narrowed by |
//! |--------|---------|------|-------------|
//! | `subscribe_order_updates` | `orders` | `order_status_update` | `orderId` (optional) |
//! | `subscribe_cart_sync` | `cart` | `cart_sync` | `userId` |
//! | `subscribe_offer_updates` | `offers` | `offer_update` | none |
//! | `subscribe_support_chat` | `support` | `support_chat_message` | `ticketId` |
//! | `subscribe_wallet_updates` | `wallet` | `wallet_update` | `userId` |
//!
//! Messages that pass the filter but fail to decode are logged and skipped.

use std::sync::Arc;

use tracing::warn;

use perkstream_core::{
    channels, CartSync, Message, MessageCallback, MessageFilter, OfferUpdate, OrderStatusUpdate,
    Payload, SubscriptionId, SupportChatMessage, WalletUpdate,
};

use crate::error::RealtimeResult;
use crate::handle::RealtimeHandle;

impl RealtimeHandle {
    /// Order status changes, for one order or for all of them.
    pub async fn subscribe_order_updates<F>(
        &self,
        order_id: Option<&str>,
        callback: F,
    ) -> RealtimeResult<SubscriptionId>
    where
        F: Fn(OrderStatusUpdate) + Send + Sync + 'static,
    {
        let filter = payload_filter::<OrderStatusUpdate>("orderId", order_id);
        let callback = typed::<OrderStatusUpdate, _>(callback);
        self.register(channels::ORDERS, callback, Some(filter)).await
    }

    pub async fn subscribe_cart_sync<F>(
        &self,
        user_id: &str,
        callback: F,
    ) -> RealtimeResult<SubscriptionId>
    where
        F: Fn(CartSync) + Send + Sync + 'static,
    {
        let filter = payload_filter::<CartSync>("userId", Some(user_id));
        let callback = typed::<CartSync, _>(callback);
        self.register(channels::CART, callback, Some(filter)).await
    }

    pub async fn subscribe_offer_updates<F>(&self, callback: F) -> RealtimeResult<SubscriptionId>
    where
        F: Fn(OfferUpdate) + Send + Sync + 'static,
    {
        let filter = payload_filter::<OfferUpdate>("offerId", None);
        let callback = typed::<OfferUpdate, _>(callback);
        self.register(channels::OFFERS, callback, Some(filter)).await
    }

    pub async fn subscribe_support_chat<F>(
        &self,
        ticket_id: &str,
        callback: F,
    ) -> RealtimeResult<SubscriptionId>
    where
        F: Fn(SupportChatMessage) + Send + Sync + 'static,
    {
        let filter = payload_filter::<SupportChatMessage>("ticketId", Some(ticket_id));
        let callback = typed::<SupportChatMessage, _>(callback);
        self.register(channels::SUPPORT, callback, Some(filter)).await
    }

    pub async fn subscribe_wallet_updates<F>(
        &self,
        user_id: &str,
        callback: F,
    ) -> RealtimeResult<SubscriptionId>
    where
        F: Fn(WalletUpdate) + Send + Sync + 'static,
    {
        let filter = payload_filter::<WalletUpdate>("userId", Some(user_id));
        let callback = typed::<WalletUpdate, _>(callback);
        self.register(channels::WALLET, callback, Some(filter)).await
    }
}

/// Matches `P::KIND`, and `data[field] == expected` when `expected` is set.
fn payload_filter<P>(field: &'static str, expected: Option<&str>) -> MessageFilter
where
    P: Payload + 'static,
{
    let expected = expected.map(str::to_string);
    Arc::new(move |message: &Message| {
        message.kind == P::KIND
            && expected.as_deref().map_or(true, |want| {
                message.data.get(field).and_then(|v| v.as_str()) == Some(want)
            })
    })
}

/// Wraps a typed callback into a raw message callback.
fn typed<P, F>(callback: F) -> MessageCallback
where
    P: Payload + 'static,
    F: Fn(P) + Send + Sync + 'static,
{
    Arc::new(move |message: &Message| match message.decode::<P>() {
        Ok(payload) => callback(payload),
        Err(e) => warn!(kind = %message.kind, error = %e, "Skipping undecodable payload"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_filter_by_id() {
        let filter = payload_filter::<OrderStatusUpdate>("orderId", Some("ord-1"));

        let mine = Message::new("order_status_update", json!({ "orderId": "ord-1" }));
        let other = Message::new("order_status_update", json!({ "orderId": "ord-2" }));
        let wrong_type = Message::new("cart_sync", json!({ "orderId": "ord-1" }));

        assert!(filter(&mine));
        assert!(!filter(&other));
        assert!(!filter(&wrong_type));
    }

    #[test]
    fn test_filter_without_id_matches_type_only() {
        let filter = payload_filter::<OfferUpdate>("offerId", None);
        assert!(filter(&Message::new("offer_update", json!({}))));
        assert!(!filter(&Message::new("wallet_update", json!({}))));
    }

    #[test]
    fn test_typed_callback_skips_bad_payload() {
        let (tx, rx) = std::sync::mpsc::channel();
        let callback = typed::<WalletUpdate, _>(move |update| {
            tx.send(update.balance_cents).unwrap();
        });

        callback(&Message::new(
            "wallet_update",
            json!({ "userId": "u", "balanceCents": 250 }),
        ));
        callback(&Message::new("wallet_update", json!({ "userId": "u" })));

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![250]);
    }
}
