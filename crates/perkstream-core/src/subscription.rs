//! # Subscriptions
//!
//! Channel-keyed callbacks for inbound messages.
//!
//! ## Matching Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Does subscription S receive message M?              │
//! │                                                                         │
//! │  1. S.channel == "all"                 ─┐                               │
//! │  2. S.channel == M.type                 ├─ any one of these, AND        │
//! │  3. S.channel == M.data.channel        ─┘                               │
//! │                                                                         │
//! │  4. S.filter is None, or S.filter(M) == true                            │
//! │                                                                         │
//! │  A panicking filter or callback is caught and reported as a            │
//! │  CallbackFailure; the remaining subscriptions still run.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;
use crate::payload::channels;

/// Callback invoked with each matching message.
pub type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Extra predicate narrowing matches within a channel.
pub type MessageFilter = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

// =============================================================================
// Subscription ID
// =============================================================================

/// Unique subscription identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Generates a fresh ID.
    pub fn generate() -> Self {
        SubscriptionId(format!("sub_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// A registered (channel, callback, filter) tuple.
#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub channel: String,
    callback: MessageCallback,
    filter: Option<MessageFilter>,
}

impl Subscription {
    pub fn new(
        channel: impl Into<String>,
        callback: MessageCallback,
        filter: Option<MessageFilter>,
    ) -> Self {
        Subscription {
            id: SubscriptionId::generate(),
            channel: channel.into(),
            callback,
            filter,
        }
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Rules 1-3: the channel names the wildcard, the type or `data.channel`.
    pub fn matches_channel(&self, message: &Message) -> bool {
        self.channel == channels::ALL
            || self.channel == message.kind.as_str()
            || message.channel() == Some(self.channel.as_str())
    }

    /// Applies all matching rules, including the filter, to `message`.
    ///
    /// The filter runs unguarded here; [`SubscriptionRegistry::dispatch`]
    /// is the panic-safe path.
    pub fn matches(&self, message: &Message) -> bool {
        self.matches_channel(message) && self.passes_filter(message)
    }

    fn passes_filter(&self, message: &Message) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(message))
    }
}

impl Subscription {
    fn failure(&self, stage: FailureStage, panic: &(dyn Any + Send)) -> CallbackFailure {
        CallbackFailure {
            subscription: self.id.clone(),
            channel: self.channel.clone(),
            stage,
            reason: panic_reason(panic),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("filtered", &self.has_filter())
            .finish()
    }
}

// =============================================================================
// Dispatch Outcome
// =============================================================================

/// Which part of a subscription panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Filter,
    Callback,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Filter => write!(f, "filter"),
            FailureStage::Callback => write!(f, "callback"),
        }
    }
}

/// A filter or callback that panicked during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFailure {
    pub subscription: SubscriptionId,
    pub channel: String,
    pub stage: FailureStage,
    pub reason: String,
}

/// Result of fanning one message out to the registry.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Callbacks that ran to completion.
    pub delivered: usize,
    pub failures: Vec<CallbackFailure>,
}

// =============================================================================
// Registry
// =============================================================================

/// Subscription table, kept in registration order.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Vec<Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscription and returns its ID.
    pub fn insert(&mut self, subscription: Subscription) -> SubscriptionId {
        let id = subscription.id.clone();
        self.entries.push(subscription);
        id
    }

    /// Removes a subscription, returning it if it existed.
    pub fn remove(&mut self, id: &SubscriptionId) -> Option<Subscription> {
        let index = self.entries.iter().position(|s| &s.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, id: &SubscriptionId) -> Option<&Subscription> {
        self.entries.iter().find(|s| &s.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Snapshot of all subscriptions.
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.entries.clone()
    }

    /// Invokes every matching callback, isolating panics.
    ///
    /// A filter that panics counts as no match and is reported with
    /// [`FailureStage::Filter`].
    pub fn dispatch(&self, message: &Message) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        for subscription in self.entries.iter().filter(|s| s.matches_channel(message)) {
            let filtered = catch_unwind(AssertUnwindSafe(|| subscription.passes_filter(message)));
            let passed = match filtered {
                Ok(passed) => passed,
                Err(panic) => {
                    outcome
                        .failures
                        .push(subscription.failure(FailureStage::Filter, panic.as_ref()));
                    continue;
                }
            };
            if !passed {
                continue;
            }

            let callback = &subscription.callback;
            match catch_unwind(AssertUnwindSafe(|| callback(message))) {
                Ok(()) => outcome.delivered += 1,
                Err(panic) => outcome
                    .failures
                    .push(subscription.failure(FailureStage::Callback, panic.as_ref())),
            }
        }

        outcome
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
