//! # Realtime Handle
//!
//! Cloneable front door to the client actor. Every method is a command sent
//! to the actor and answered over a oneshot channel; only [`status`] reads
//! locally, from the published watch value.
//!
//! After [`destroy`] (or if the actor stopped for any other reason) every
//! async method returns [`RealtimeError::ShuttingDown`].
//!
//! [`status`]: RealtimeHandle::status
//! [`destroy`]: RealtimeHandle::destroy

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use perkstream_core::{
    ConnectionEvent, ConnectionHistory, ConnectionStatus, EventKind, EventListener, Message,
    MessageCallback, MessageFilter, Subscription, SubscriptionId,
};

use crate::client::Command;
use crate::error::{RealtimeError, RealtimeResult};

#[derive(Clone)]
pub struct RealtimeHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl RealtimeHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        status: watch::Receiver<ConnectionStatus>,
    ) -> Self {
        RealtimeHandle { commands, status }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> RealtimeResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| RealtimeError::ShuttingDown)?;
        response.await.map_err(|_| RealtimeError::ShuttingDown)
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Loads the stored connection history and, if `auto_connect` is set,
    /// starts connecting.
    pub async fn initialize(&self) -> RealtimeResult<()> {
        self.request(|reply| Command::Initialize { reply }).await?
    }

    /// Starts connecting, optionally to a different endpoint.
    ///
    /// Returns once the attempt has started; watch [`status_changes`] or the
    /// `connected` event for the outcome. No-op if already connected or
    /// connecting. An override endpoint is kept for later reconnects.
    ///
    /// [`status_changes`]: RealtimeHandle::status_changes
    pub async fn connect(&self, url: Option<&str>) -> RealtimeResult<()> {
        let url = url.map(str::to_string);
        self.request(|reply| Command::Connect { url, reply }).await?
    }

    /// Closes the connection with code 1000 and cancels all timers.
    pub async fn disconnect(&self) -> RealtimeResult<()> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Stores (or clears) the bearer token. Reconnects if currently connected.
    pub async fn update_auth_token(&self, token: Option<&str>) -> RealtimeResult<()> {
        let token = token.map(str::to_string);
        self.request(|reply| Command::UpdateAuthToken { token, reply })
            .await?
    }

    /// Disconnects and drops all subscriptions, listeners and queued messages,
    /// then stops the actor.
    pub async fn destroy(&self) -> RealtimeResult<()> {
        self.request(|reply| Command::Destroy { reply }).await
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Sends a message, returning true only if it was transmitted immediately.
    /// Otherwise it is queued for the next connection.
    pub async fn send(&self, message: Message) -> RealtimeResult<bool> {
        self.request(|reply| Command::Send { message, reply }).await
    }

    pub async fn queue_size(&self) -> RealtimeResult<usize> {
        self.request(|reply| Command::QueueSize { reply }).await
    }

    pub async fn clear_queue(&self) -> RealtimeResult<()> {
        self.request(|reply| Command::ClearQueue { reply }).await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    pub async fn subscribe(
        &self,
        channel: &str,
        callback: MessageCallback,
    ) -> RealtimeResult<SubscriptionId> {
        self.register(channel, callback, None).await
    }

    pub async fn subscribe_filtered(
        &self,
        channel: &str,
        callback: MessageCallback,
        filter: MessageFilter,
    ) -> RealtimeResult<SubscriptionId> {
        self.register(channel, callback, Some(filter)).await
    }

    pub(crate) async fn register(
        &self,
        channel: &str,
        callback: MessageCallback,
        filter: Option<MessageFilter>,
    ) -> RealtimeResult<SubscriptionId> {
        let channel = channel.to_string();
        self.request(|reply| Command::Subscribe {
            channel,
            callback,
            filter,
            reply,
        })
        .await
    }

    /// Returns false if `id` is unknown.
    pub async fn unsubscribe(&self, id: &SubscriptionId) -> RealtimeResult<bool> {
        let id = id.clone();
        self.request(|reply| Command::Unsubscribe { id, reply }).await
    }

    pub async fn subscriptions(&self) -> RealtimeResult<Vec<Subscription>> {
        self.request(|reply| Command::Subscriptions { reply }).await
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Registers a listener. Returns false if it was already registered.
    pub async fn on(&self, kind: EventKind, listener: EventListener) -> RealtimeResult<bool> {
        self.request(|reply| Command::On {
            kind,
            listener,
            reply,
        })
        .await
    }

    /// Convenience over [`on`](RealtimeHandle::on) for a closure.
    pub async fn on_event<F>(&self, kind: EventKind, listener: F) -> RealtimeResult<EventListener>
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let listener: EventListener = Arc::new(listener);
        self.on(kind, listener.clone()).await?;
        Ok(listener)
    }

    pub async fn off(&self, kind: EventKind, listener: &EventListener) -> RealtimeResult<bool> {
        let listener = listener.clone();
        self.request(|reply| Command::Off {
            kind,
            listener,
            reply,
        })
        .await
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Snapshot of the connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Receiver that is notified on every status change.
    pub fn status_changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub async fn history(&self) -> RealtimeResult<ConnectionHistory> {
        self.request(|reply| Command::History { reply }).await
    }

    /// Returns true once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

impl std::fmt::Debug for RealtimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeHandle")
            .field("status", &*self.status.borrow())
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}
