//! # App Lifecycle
//!
//! Foreground/background signal from the host process.
//!
//! The client registers one callback when it is spawned and removes the
//! registration in `destroy()`. Coming to the foreground while disconnected
//! triggers a connect; going to the background keeps the connection as is.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Host process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    Active,
    Background,
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppState::Active => write!(f, "active"),
            AppState::Background => write!(f, "background"),
        }
    }
}

pub type LifecycleCallback = Box<dyn Fn(AppState) + Send + Sync>;

/// Source of lifecycle notifications.
pub trait LifecycleNotifier: Send + Sync {
    fn register(&self, callback: LifecycleCallback) -> Box<dyn LifecycleRegistration>;
}

/// Handle returned by [`LifecycleNotifier::register`].
pub trait LifecycleRegistration: Send {
    fn remove(self: Box<Self>);
}

// =============================================================================
// No-Op Notifier
// =============================================================================

/// Notifier for hosts without a lifecycle (servers, CLIs).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpLifecycle;

struct NoOpRegistration;

impl LifecycleRegistration for NoOpRegistration {
    fn remove(self: Box<Self>) {}
}

impl LifecycleNotifier for NoOpLifecycle {
    fn register(&self, _callback: LifecycleCallback) -> Box<dyn LifecycleRegistration> {
        Box::new(NoOpRegistration)
    }
}

// =============================================================================
// Manual Notifier
// =============================================================================

type CallbackTable = Arc<Mutex<HashMap<u64, Arc<LifecycleCallback>>>>;

/// Notifier driven by explicit [`notify`](ManualLifecycle::notify) calls.
///
/// Clones share the same callback table, so the host keeps one clone and
/// hands another to the client.
#[derive(Clone, Default)]
pub struct ManualLifecycle {
    callbacks: CallbackTable,
    next_id: Arc<Mutex<u64>>,
}

impl ManualLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `state` to every registered callback.
    pub fn notify(&self, state: AppState) {
        // Snapshot first so callbacks may register/unregister re-entrantly.
        let callbacks: Vec<_> = lock(&self.callbacks).values().cloned().collect();
        for callback in callbacks {
            callback(state);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.callbacks).len()
    }
}

impl LifecycleNotifier for ManualLifecycle {
    fn register(&self, callback: LifecycleCallback) -> Box<dyn LifecycleRegistration> {
        let id = {
            let mut next = lock(&self.next_id);
            *next += 1;
            *next
        };
        lock(&self.callbacks).insert(id, Arc::new(callback));
        Box::new(ManualRegistration {
            id,
            callbacks: self.callbacks.clone(),
        })
    }
}

struct ManualRegistration {
    id: u64,
    callbacks: CallbackTable,
}

impl LifecycleRegistration for ManualRegistration {
    fn remove(self: Box<Self>) {
        lock(&self.callbacks).remove(&self.id);
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
