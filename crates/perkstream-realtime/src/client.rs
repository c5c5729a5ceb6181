//! # Realtime Client
//!
//! The actor task that owns the connection, the outbound queue, the
//! subscription table and the listener table.
//!
//! ## Actor Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      RealtimeClient Actor Loop                          │
//! │                                                                         │
//! │   RealtimeHandle ──Command──► ┌────────────────────────────────────┐    │
//! │   (clone per caller)          │          tokio::select!            │    │
//! │        ▲                      │                                    │    │
//! │        │ oneshot reply        │  commands         mpsc (bounded)   │    │
//! │        └──────────────────────│  pending_connect  boxed open fut   │    │
//! │                               │  transport        next_event()     │    │
//! │   watch<ConnectionStatus> ◄───│  heartbeat        Option<Interval> │    │
//! │                               │  reconnect_timer  Option<Sleep>    │    │
//! │                               └────────────────────────────────────┘    │
//! │                                                                         │
//! │  Each slot is an Option: at most one open attempt, one heartbeat and   │
//! │  one reconnect timer exist at a time. Clearing the slot cancels it.    │
//! │                                                                         │
//! │  LifecycleNotifier ──AppState──► lifecycle        mpsc (unbounded)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reconnect Accounting
//! The attempt counter is compared against `max_attempts` when a reconnect
//! is scheduled and incremented when the timer fires. With `max_attempts = 2`
//! and an unreachable server the client makes three opens (the initial one
//! plus two retries) and ends `Closed` with `reconnect_attempts == 2`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, warn};
use url::Url;

use perkstream_core::{
    ConnectionEvent, ConnectionHistory, ConnectionPhase, ConnectionStatus, EventKind,
    EventListener, EventListeners, Heartbeat, Message, MessageCallback, MessageFilter,
    MessageType, OutboundQueue, Subscription, SubscriptionId, SubscriptionRegistry,
    AUTH_TOKEN_KEY, CONNECTION_HISTORY_KEY, NORMAL_CLOSURE,
};

use crate::config::{validate_endpoint, RealtimeConfig};
use crate::error::{RealtimeError, RealtimeResult};
use crate::handle::RealtimeHandle;
use crate::lifecycle::{AppState, LifecycleNotifier, LifecycleRegistration, NoOpLifecycle};
use crate::reconnect::ReconnectPolicy;
use crate::storage::{KeyValueStore, MemoryStore};
use crate::transport::{Connector, Transport, TransportEvent, WsConnector};

/// Capacity of the handle → actor command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 100;

const DISCONNECT_REASON: &str = "Client disconnect";

type PendingConnect = Pin<Box<dyn Future<Output = RealtimeResult<Box<dyn Transport>>> + Send>>;

// =============================================================================
// Commands
// =============================================================================

pub(crate) enum Command {
    Initialize {
        reply: oneshot::Sender<RealtimeResult<()>>,
    },
    Connect {
        url: Option<String>,
        reply: oneshot::Sender<RealtimeResult<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    UpdateAuthToken {
        token: Option<String>,
        reply: oneshot::Sender<RealtimeResult<()>>,
    },
    Send {
        message: Message,
        reply: oneshot::Sender<bool>,
    },
    QueueSize {
        reply: oneshot::Sender<usize>,
    },
    ClearQueue {
        reply: oneshot::Sender<()>,
    },
    Subscribe {
        channel: String,
        callback: MessageCallback,
        filter: Option<MessageFilter>,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: oneshot::Sender<bool>,
    },
    Subscriptions {
        reply: oneshot::Sender<Vec<Subscription>>,
    },
    On {
        kind: EventKind,
        listener: EventListener,
        reply: oneshot::Sender<bool>,
    },
    Off {
        kind: EventKind,
        listener: EventListener,
        reply: oneshot::Sender<bool>,
    },
    History {
        reply: oneshot::Sender<ConnectionHistory>,
    },
    Destroy {
        reply: oneshot::Sender<()>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

// =============================================================================
// Realtime Client
// =============================================================================

/// The realtime connection actor. Create it with [`RealtimeClient::builder`];
/// interact with it through the returned [`RealtimeHandle`].
pub struct RealtimeClient {
    config: RealtimeConfig,
    endpoint: Option<Url>,
    connector: Arc<dyn Connector>,
    storage: Arc<dyn KeyValueStore>,

    commands: mpsc::Receiver<Command>,
    lifecycle_rx: mpsc::UnboundedReceiver<AppState>,
    status_tx: watch::Sender<ConnectionStatus>,
    status: ConnectionStatus,

    queue: OutboundQueue,
    subscriptions: SubscriptionRegistry,
    listeners: EventListeners,
    history: ConnectionHistory,
    policy: ReconnectPolicy,

    transport: Option<Box<dyn Transport>>,
    pending_connect: Option<PendingConnect>,
    heartbeat: Option<Interval>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    lifecycle: Option<Box<dyn LifecycleRegistration>>,
}

impl RealtimeClient {
    pub fn builder(config: RealtimeConfig) -> RealtimeClientBuilder {
        RealtimeClientBuilder::new(config)
    }

    /// Main actor loop.
    async fn run(mut self) {
        info!(
            url = self.endpoint.as_ref().map(Url::as_str).unwrap_or("<unset>"),
            "Realtime client started"
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await == Flow::Stop {
                            break;
                        }
                    }
                    None => {
                        debug!("All handles dropped, shutting down");
                        self.teardown().await;
                        break;
                    }
                },
                result = poll_pending_connect(&mut self.pending_connect) => {
                    self.pending_connect = None;
                    match result {
                        Ok(transport) => self.on_open(transport).await,
                        Err(e) => self.on_open_failed(e),
                    }
                }
                event = next_transport_event(&mut self.transport) => {
                    self.on_transport_event(event).await;
                }
                _ = tick_heartbeat(&mut self.heartbeat) => {
                    self.send_heartbeat().await;
                }
                _ = wait_reconnect(&mut self.reconnect_timer) => {
                    self.on_reconnect_timer().await;
                }
                // Disabled once the notifier drops its callback.
                Some(state) = self.lifecycle_rx.recv() => self.on_lifecycle(state),
            }
        }

        info!("Realtime client stopped");
    }

    async fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Initialize { reply } => {
                let _ = reply.send(self.initialize().await);
            }
            Command::Connect { url, reply } => {
                let _ = reply.send(self.connect(url));
            }
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(());
            }
            Command::UpdateAuthToken { token, reply } => {
                let _ = reply.send(self.update_auth_token(token).await);
            }
            Command::Send { message, reply } => {
                let _ = reply.send(self.send(message).await);
            }
            Command::QueueSize { reply } => {
                let _ = reply.send(self.queue.len());
            }
            Command::ClearQueue { reply } => {
                debug!(dropped = self.queue.len(), "Outbound queue cleared");
                self.queue.clear();
                let _ = reply.send(());
            }
            Command::Subscribe {
                channel,
                callback,
                filter,
                reply,
            } => {
                let id = self.subscribe(channel, callback, filter).await;
                let _ = reply.send(id);
            }
            Command::Unsubscribe { id, reply } => {
                let _ = reply.send(self.unsubscribe(&id).await);
            }
            Command::Subscriptions { reply } => {
                let _ = reply.send(self.subscriptions.snapshot());
            }
            Command::On {
                kind,
                listener,
                reply,
            } => {
                let _ = reply.send(self.listeners.add(kind, listener));
            }
            Command::Off {
                kind,
                listener,
                reply,
            } => {
                let _ = reply.send(self.listeners.remove(kind, &listener));
            }
            Command::History { reply } => {
                let _ = reply.send(self.history.clone());
            }
            Command::Destroy { reply } => {
                self.teardown().await;
                let _ = reply.send(());
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    // =========================================================================
    // Connection Lifecycle
    // =========================================================================

    async fn initialize(&mut self) -> RealtimeResult<()> {
        self.load_history().await;

        if self.config.connection.auto_connect {
            if self.endpoint.is_some() {
                self.connect(None)?;
            } else {
                debug!("No endpoint configured, skipping auto-connect");
            }
        }
        Ok(())
    }

    /// Starts an open attempt. The actual handshake runs in `pending_connect`.
    fn connect(&mut self, url: Option<String>) -> RealtimeResult<()> {
        if self.status.connected() || self.status.connecting() {
            warn!(phase = %self.status.phase, "Connect ignored, already connected or connecting");
            return Ok(());
        }

        if let Some(raw) = url {
            self.endpoint = Some(validate_endpoint(&raw)?);
        }
        let endpoint = self
            .endpoint
            .clone()
            .ok_or_else(|| RealtimeError::InvalidConfig("No realtime endpoint configured".into()))?;

        self.reconnect_timer = None;

        let storage = self.storage.clone();
        let connector = self.connector.clone();
        self.pending_connect = Some(Box::pin(async move {
            let url = authorized_url(&endpoint, storage.as_ref()).await;
            connector.connect(&url).await
        }));

        info!(
            url = %self.endpoint.as_ref().map(Url::as_str).unwrap_or_default(),
            attempt = self.status.reconnect_attempts,
            "Connecting to realtime server"
        );
        self.set_phase(ConnectionPhase::Connecting);
        self.emit(ConnectionEvent::Connecting);
        Ok(())
    }

    async fn on_open(&mut self, transport: Box<dyn Transport>) {
        self.transport = Some(transport);

        let now = Utc::now();
        self.status.reconnect_attempts = 0;
        self.status.last_connected_at = Some(now);
        self.status.last_error = None;
        self.set_phase(ConnectionPhase::Connected);
        self.policy.reset();
        info!("Realtime connection established");

        self.start_heartbeat();
        self.record_connection(now).await;
        self.flush_queue().await;
        self.emit(ConnectionEvent::Connected);
    }

    fn on_open_failed(&mut self, error: RealtimeError) {
        let message = error.to_string();
        warn!(error = %message, retryable = error.is_retryable(), "Connection attempt failed");

        self.status.last_error = Some(message.clone());
        self.history.record_error(&message);
        self.publish_status();
        self.emit(ConnectionEvent::Error { message });
        self.schedule_reconnect();
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.on_inbound(text).await,
            TransportEvent::Error(message) => {
                warn!(error = %message, "Transport error");
                self.status.last_error = Some(message.clone());
                self.history.record_error(&message);
                self.publish_status();
                self.emit(ConnectionEvent::Error { message });
            }
            TransportEvent::Closed { code, reason } => self.on_closed(code, reason),
        }
    }

    fn on_closed(&mut self, code: u16, reason: String) {
        self.transport = None;
        self.heartbeat = None;
        info!(code, reason = %reason, "Realtime connection closed");

        // An abnormal close goes straight to Reconnecting (or Closed on give-up).
        let abnormal = code != NORMAL_CLOSURE;
        if !abnormal {
            self.set_phase(ConnectionPhase::Closed);
        }
        self.emit(ConnectionEvent::Disconnected { code, reason });

        if abnormal {
            self.schedule_reconnect();
        }
    }

    /// Tears the connection down with a normal close. Idempotent.
    async fn disconnect(&mut self) {
        self.heartbeat = None;
        self.reconnect_timer = None;
        self.pending_connect = None;

        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close(NORMAL_CLOSURE, DISCONNECT_REASON).await {
                debug!(?e, "Close handshake failed");
            }
        }

        self.status.last_error = None;
        self.set_phase(ConnectionPhase::Closed);
        info!("Disconnected from realtime server");
        self.emit(ConnectionEvent::Disconnected {
            code: NORMAL_CLOSURE,
            reason: DISCONNECT_REASON.to_string(),
        });
    }

    async fn update_auth_token(&mut self, token: Option<String>) -> RealtimeResult<()> {
        match token {
            Some(ref token) => self.storage.set(AUTH_TOKEN_KEY, token).await?,
            None => self.storage.remove(AUTH_TOKEN_KEY).await?,
        }
        debug!(present = token.is_some(), "Auth token updated");

        if self.status.connected() {
            info!("Reconnecting with updated auth token");
            self.disconnect().await;
            self.connect(None)?;
        }
        Ok(())
    }

    fn on_lifecycle(&mut self, state: AppState) {
        match state {
            AppState::Active
                if !self.status.connected()
                    && !self.status.connecting()
                    && self.config.reconnect.enabled =>
            {
                info!("App became active while disconnected, connecting");
                if let Err(e) = self.connect(None) {
                    warn!(?e, "Foreground connect failed");
                }
            }
            _ => debug!(%state, phase = %self.status.phase, "Lifecycle change ignored"),
        }
    }

    async fn teardown(&mut self) {
        self.disconnect().await;
        self.subscriptions.clear();
        self.listeners.clear();
        self.queue.clear();
        if let Some(registration) = self.lifecycle.take() {
            registration.remove();
        }
        self.set_phase(ConnectionPhase::Idle);
        info!("Realtime client destroyed");
    }

    // =========================================================================
    // Reconnect
    // =========================================================================

    fn schedule_reconnect(&mut self) {
        if !self.config.reconnect.enabled {
            self.set_phase(ConnectionPhase::Closed);
            return;
        }

        let max_attempts = self.config.reconnect.max_attempts;
        if self.status.reconnect_attempts >= max_attempts {
            warn!(
                attempts = self.status.reconnect_attempts,
                max_attempts, "Max reconnect attempts reached, giving up"
            );
            self.set_phase(ConnectionPhase::Closed);
            return;
        }

        let delay = self.policy.next_delay();
        let attempt = self.status.reconnect_attempts + 1;
        self.reconnect_timer = Some(Box::pin(sleep(delay)));
        self.set_phase(ConnectionPhase::Reconnecting);
        info!(attempt, max_attempts, ?delay, "Reconnect scheduled");
        self.emit(ConnectionEvent::Reconnecting { attempt });
    }

    async fn on_reconnect_timer(&mut self) {
        self.reconnect_timer = None;
        self.status.reconnect_attempts += 1;
        self.publish_status();
        if let Err(e) = self.connect(None) {
            warn!(?e, "Reconnect attempt could not start");
            self.set_phase(ConnectionPhase::Closed);
        }
    }

    // =========================================================================
    // Heartbeat
    // =========================================================================

    fn start_heartbeat(&mut self) {
        if !self.config.heartbeat.enabled {
            self.heartbeat = None;
            return;
        }
        let period = self.config.heartbeat_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat = Some(ticker);
    }

    async fn send_heartbeat(&mut self) {
        let heartbeat = Message::heartbeat().stamped();
        if let Err(e) = self.transmit(&heartbeat).await {
            warn!(?e, "Heartbeat failed");
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    async fn send(&mut self, message: Message) -> bool {
        let message = message.stamped();

        if !self.status.connected() {
            self.enqueue(message);
            return false;
        }

        match self.transmit(&message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(?e, kind = %message.kind, "Send failed, queueing message");
                self.enqueue(message);
                false
            }
        }
    }

    async fn transmit(&mut self, message: &Message) -> RealtimeResult<()> {
        let transport = self.transport.as_mut().ok_or(RealtimeError::Disconnected)?;
        let text = message.to_json()?;
        transport.send(text).await?;
        debug!(kind = %message.kind, id = ?message.id, "Message sent");
        Ok(())
    }

    fn enqueue(&mut self, message: Message) {
        let kind = message.kind.clone();
        if let Some(evicted) = self.queue.push(message) {
            warn!(
                evicted_id = ?evicted.id,
                evicted_kind = %evicted.kind,
                capacity = self.queue.capacity(),
                "Outbound queue full, dropped oldest message"
            );
        }
        debug!(%kind, queued = self.queue.len(), "Message queued");
    }

    /// Drains the queue in order, stopping at the first failure.
    async fn flush_queue(&mut self) {
        let total = self.queue.len();
        if total == 0 {
            return;
        }

        let mut sent = 0usize;
        while let Some(message) = self.queue.front().cloned() {
            match self.transmit(&message).await {
                Ok(()) => {
                    self.queue.pop_front();
                    sent += 1;
                }
                Err(e) => {
                    warn!(?e, remaining = self.queue.len(), "Queue flush interrupted");
                    break;
                }
            }
        }
        info!(sent, total, "Outbound queue flushed");
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    async fn on_inbound(&mut self, text: String) {
        let message = match Message::from_json(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Dropping malformed message");
                return;
            }
        };

        if message.kind.is_keepalive() {
            self.on_keepalive(&message).await;
            return;
        }

        self.emit(ConnectionEvent::Message(message.clone()));

        let outcome = self.subscriptions.dispatch(&message);
        for failure in &outcome.failures {
            error!(
                subscription = %failure.subscription,
                channel = %failure.channel,
                stage = %failure.stage,
                reason = %failure.reason,
                "Subscription panicked"
            );
        }
        debug!(
            kind = %message.kind,
            delivered = outcome.delivered,
            failed = outcome.failures.len(),
            "Message dispatched"
        );
    }

    /// Answers a server heartbeat; acks are only logged.
    async fn on_keepalive(&mut self, message: &Message) {
        if message.kind == MessageType::HeartbeatAck {
            debug!(timestamp = ?message.data.get("timestamp"), "Heartbeat acknowledged");
            return;
        }

        let echo = message
            .decode::<Heartbeat>()
            .map(|heartbeat| heartbeat.timestamp)
            .ok()
            .or(message.timestamp);
        let ack = Message::heartbeat_ack(echo).stamped();
        if let Err(e) = self.transmit(&ack).await {
            warn!(?e, "Heartbeat ack failed");
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    async fn subscribe(
        &mut self,
        channel: String,
        callback: MessageCallback,
        filter: Option<MessageFilter>,
    ) -> SubscriptionId {
        let id = self
            .subscriptions
            .insert(Subscription::new(channel.clone(), callback, filter));
        info!(%id, channel = %channel, "Subscribed");
        self.send(Message::subscribe(&channel)).await;
        id
    }

    async fn unsubscribe(&mut self, id: &SubscriptionId) -> bool {
        let Some(channel) = self.subscriptions.get(id).map(|s| s.channel.clone()) else {
            debug!(%id, "Unsubscribe for unknown subscription");
            return false;
        };

        self.send(Message::unsubscribe(&channel)).await;
        self.subscriptions.remove(id);
        info!(%id, channel = %channel, "Unsubscribed");
        true
    }

    // =========================================================================
    // History
    // =========================================================================

    async fn load_history(&mut self) {
        match self.storage.get(CONNECTION_HISTORY_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<ConnectionHistory>(&json) {
                Ok(history) => {
                    debug!(
                        total_connections = history.total_connections,
                        "Connection history loaded"
                    );
                    if self.status.last_connected_at.is_none() {
                        self.status.last_connected_at = history.last_connected_at;
                        self.publish_status();
                    }
                    self.history = history;
                }
                Err(e) => warn!(error = %e, "Ignoring unreadable connection history"),
            },
            Ok(None) => debug!("No connection history stored"),
            Err(e) => warn!(?e, "Failed to read connection history"),
        }
    }

    async fn record_connection(&mut self, at: chrono::DateTime<Utc>) {
        let endpoint = self
            .endpoint
            .as_ref()
            .map(Url::as_str)
            .unwrap_or_default()
            .to_string();
        self.history.record_connected(&endpoint, at);

        let json = match serde_json::to_string(&self.history) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to encode connection history");
                return;
            }
        };
        if let Err(e) = self.storage.set(CONNECTION_HISTORY_KEY, &json).await {
            warn!(?e, "Failed to persist connection history");
        }
    }

    // =========================================================================
    // Status & Events
    // =========================================================================

    fn set_phase(&mut self, phase: ConnectionPhase) {
        self.status.phase = phase;
        self.publish_status();
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.status.clone());
    }

    fn emit(&self, event: ConnectionEvent) {
        for failure in self.listeners.emit(&event) {
            error!(event = %failure.kind, reason = %failure.reason, "Event listener panicked");
        }
    }
}

/// Appends the stored bearer token (if any) as the `token` query parameter.
async fn authorized_url(endpoint: &Url, storage: &dyn KeyValueStore) -> Url {
    let token = match storage.get(AUTH_TOKEN_KEY).await {
        Ok(token) => token,
        Err(e) => {
            warn!(?e, "Failed to read auth token, connecting without it");
            None
        }
    };

    let mut url = endpoint.clone();
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let kept: Vec<(String, String)> = endpoint
            .query_pairs()
            .filter(|(key, _)| key != "token")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair("token", &token);
    }
    url
}

// =============================================================================
// Select Helpers
// =============================================================================
// Each helper stays pending forever when its slot is empty, so the matching
// select! branch is inert.

async fn poll_pending_connect(
    slot: &mut Option<PendingConnect>,
) -> RealtimeResult<Box<dyn Transport>> {
    match slot {
        Some(connect) => connect.await,
        None => std::future::pending().await,
    }
}

async fn next_transport_event(slot: &mut Option<Box<dyn Transport>>) -> TransportEvent {
    match slot {
        Some(transport) => transport.next_event().await,
        None => std::future::pending().await,
    }
}

async fn tick_heartbeat(slot: &mut Option<Interval>) {
    match slot {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_reconnect(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for spawning a [`RealtimeClient`].
pub struct RealtimeClientBuilder {
    config: RealtimeConfig,
    connector: Option<Arc<dyn Connector>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    lifecycle: Option<Arc<dyn LifecycleNotifier>>,
}

impl RealtimeClientBuilder {
    pub fn new(config: RealtimeConfig) -> Self {
        RealtimeClientBuilder {
            config,
            connector: None,
            storage: None,
            lifecycle: None,
        }
    }

    /// Sets the transport connector. Defaults to [`WsConnector`].
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the token/history store. Defaults to [`MemoryStore`].
    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the lifecycle notifier. Defaults to [`NoOpLifecycle`].
    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn LifecycleNotifier>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Validates the config and spawns the actor on the current tokio runtime.
    pub fn spawn(self) -> RealtimeResult<RealtimeHandle> {
        self.config.validate()?;
        let endpoint = self.config.url().map(validate_endpoint).transpose()?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector::new(self.config.connect_timeout())));
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let lifecycle = self.lifecycle.unwrap_or_else(|| Arc::new(NoOpLifecycle));

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());

        // Unbounded: a notification is never dropped while the actor runs.
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        let registration = lifecycle.register(Box::new(move |state| {
            if lifecycle_tx.send(state).is_err() {
                debug!(%state, "Lifecycle change after client stopped");
            }
        }));

        let client = RealtimeClient {
            queue: OutboundQueue::new(self.config.queue.capacity),
            policy: ReconnectPolicy::from_settings(&self.config.reconnect),
            config: self.config,
            endpoint,
            connector,
            storage,
            commands: command_rx,
            lifecycle_rx,
            status_tx,
            status: ConnectionStatus::default(),
            subscriptions: SubscriptionRegistry::new(),
            listeners: EventListeners::new(),
            history: ConnectionHistory::default(),
            transport: None,
            pending_connect: None,
            heartbeat: None,
            reconnect_timer: None,
            lifecycle: Some(registration),
        };

        tokio::spawn(client.run());

        Ok(RealtimeHandle::new(command_tx, status_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_authorized_url_appends_token() {
        let store = MemoryStore::with_entries([(AUTH_TOKEN_KEY, "abc")]);
        let endpoint = Url::parse("wss://rt.perkstream.app/ws?v=2&token=old").unwrap();

        let url = authorized_url(&endpoint, &store).await;
        assert_eq!(url.as_str(), "wss://rt.perkstream.app/ws?v=2&token=abc");
    }

    #[tokio::test]
    async fn test_authorized_url_without_token() {
        let store = MemoryStore::new();
        let endpoint = Url::parse("ws://localhost:9000/ws").unwrap();

        let url = authorized_url(&endpoint, &store).await;
        assert_eq!(url, endpoint);
    }

    #[tokio::test]
    async fn test_spawn_rejects_non_websocket_url() {
        let result = RealtimeClient::builder(RealtimeConfig::new("http://rt.perkstream.app")).spawn();
        assert!(matches!(result, Err(RealtimeError::InvalidUrl(_))));
    }
}
