//! # Connection Events
//!
//! Typed lifecycle events and the listener table they are emitted through.
//!
//! Listeners are registered per [`EventKind`]. The same `Arc` registered twice
//! for one kind is stored once, so every emission reaches it exactly once.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::subscription::panic_reason;

/// Callback receiving connection events.
pub type EventListener = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

// =============================================================================
// Event Kind
// =============================================================================

/// Name of a connection event, used as the listener table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connected,
    Disconnected,
    Connecting,
    Reconnecting,
    Error,
    Message,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Connecting,
        EventKind::Reconnecting,
        EventKind::Error,
        EventKind::Message,
    ];
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Connected => write!(f, "connected"),
            EventKind::Disconnected => write!(f, "disconnected"),
            EventKind::Connecting => write!(f, "connecting"),
            EventKind::Reconnecting => write!(f, "reconnecting"),
            EventKind::Error => write!(f, "error"),
            EventKind::Message => write!(f, "message"),
        }
    }
}

// =============================================================================
// Connection Event
// =============================================================================

/// An event emitted by the realtime client.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Transport opened and the queue was flushed.
    Connected,

    /// Transport closed (or `disconnect()` was called).
    Disconnected { code: u16, reason: String },

    /// A connection attempt started.
    Connecting,

    /// A reconnect was scheduled. `attempt` is the attempt about to run.
    Reconnecting { attempt: u32 },

    /// Transport-level failure.
    Error { message: String },

    /// Inbound non-heartbeat message.
    Message(Message),
}

impl ConnectionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ConnectionEvent::Connected => EventKind::Connected,
            ConnectionEvent::Disconnected { .. } => EventKind::Disconnected,
            ConnectionEvent::Connecting => EventKind::Connecting,
            ConnectionEvent::Reconnecting { .. } => EventKind::Reconnecting,
            ConnectionEvent::Error { .. } => EventKind::Error,
            ConnectionEvent::Message(_) => EventKind::Message,
        }
    }
}

// =============================================================================
// Listener Table
// =============================================================================

/// A listener that panicked while handling an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    pub kind: EventKind,
    pub reason: String,
}

/// Event kind → ordered listeners.
#[derive(Default)]
pub struct EventListeners {
    table: HashMap<EventKind, Vec<EventListener>>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. Returns false if it was already registered for `kind`.
    pub fn add(&mut self, kind: EventKind, listener: EventListener) -> bool {
        let listeners = self.table.entry(kind).or_default();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Unregisters a listener. Returns false if it was not registered.
    pub fn remove(&mut self, kind: EventKind, listener: &EventListener) -> bool {
        let Some(listeners) = self.table.get_mut(&kind) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        before != listeners.len()
    }

    /// Number of listeners for `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.table.get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.table.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Calls every listener for the event's kind in registration order.
    pub fn emit(&self, event: &ConnectionEvent) -> Vec<ListenerFailure> {
        let kind = event.kind();
        let Some(listeners) = self.table.get(&kind) else {
            return Vec::new();
        };

        listeners
            .iter()
            .filter_map(|listener| {
                catch_unwind(AssertUnwindSafe(|| listener(event)))
                    .err()
                    .map(|panic| ListenerFailure {
                        kind,
                        reason: panic_reason(panic.as_ref()),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (EventListener, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let listener: EventListener = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (listener, hits)
    }

    #[test]
    fn test_duplicate_registration_is_ignored() {
        let mut listeners = EventListeners::new();
        let (listener, hits) = counting();

        assert!(listeners.add(EventKind::Connected, listener.clone()));
        assert!(!listeners.add(EventKind::Connected, listener.clone()));
        assert_eq!(listeners.count(EventKind::Connected), 1);

        listeners.emit(&ConnectionEvent::Connected);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_only_reaches_matching_kind() {
        let mut listeners = EventListeners::new();
        let (listener, hits) = counting();
        listeners.add(EventKind::Error, listener);

        listeners.emit(&ConnectionEvent::Connecting);
        listeners.emit(&ConnectionEvent::Error {
            message: "refused".into(),
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove() {
        let mut listeners = EventListeners::new();
        let (listener, hits) = counting();
        listeners.add(EventKind::Connected, listener.clone());

        assert!(listeners.remove(EventKind::Connected, &listener));
        assert!(!listeners.remove(EventKind::Connected, &listener));
        assert!(!listeners.remove(EventKind::Message, &listener));

        listeners.emit(&ConnectionEvent::Connected);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_panicking_listener_is_reported() {
        let mut listeners = EventListeners::new();
        listeners.add(EventKind::Connected, Arc::new(|_| panic!("listener broke")));
        let (listener, hits) = counting();
        listeners.add(EventKind::Connected, listener);

        let failures = listeners.emit(&ConnectionEvent::Connected);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, EventKind::Connected);
        assert_eq!(failures[0].reason, "listener broke");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_kind_names() {
        let names: Vec<String> = EventKind::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            ["connected", "disconnected", "connecting", "reconnecting", "error", "message"]
        );
        assert_eq!(
            ConnectionEvent::Reconnecting { attempt: 1 }.kind(),
            EventKind::Reconnecting
        );
    }
}
