//! Scripted in-memory transport for driving the client actor in tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use perkstream_core::{ConnectionPhase, ConnectionStatus, Message};
use perkstream_realtime::{
    Connector, KeyValueStore, MemoryStore, RealtimeClient, RealtimeConfig, RealtimeError,
    RealtimeHandle, RealtimeResult, Transport, TransportEvent,
};

pub const TEST_URL: &str = "ws://realtime.test/ws";

/// Upper bound on any single wait, in (paused) virtual time.
const WAIT_LIMIT: Duration = Duration::from_secs(600);

// =============================================================================
// Frames sent by the client
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text(Message),
    Close { code: u16, reason: String },
}

// =============================================================================
// Server
// =============================================================================

struct ServerState {
    script: Mutex<VecDeque<Option<String>>>,
    accept_by_default: AtomicBool,
    urls: Mutex<Vec<Url>>,
    connects: AtomicUsize,
    connect_times: Mutex<Vec<Instant>>,
    send_budget: Mutex<Option<usize>>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

/// Test-side control over what the connector does.
pub struct MockServer {
    state: Arc<ServerState>,
    peers: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockServer {
    /// A server that accepts every connection unless scripted otherwise.
    pub fn accepting() -> (MockServer, Arc<MockConnector>) {
        Self::build(true)
    }

    /// A server that refuses every connection unless scripted otherwise.
    pub fn refusing() -> (MockServer, Arc<MockConnector>) {
        Self::build(false)
    }

    fn build(accept_by_default: bool) -> (MockServer, Arc<MockConnector>) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let state = Arc::new(ServerState {
            script: Mutex::new(VecDeque::new()),
            accept_by_default: AtomicBool::new(accept_by_default),
            urls: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            connect_times: Mutex::new(Vec::new()),
            send_budget: Mutex::new(None),
            peers: peers_tx,
        });
        let connector = Arc::new(MockConnector {
            state: state.clone(),
        });
        (
            MockServer {
                state,
                peers: peers_rx,
            },
            connector,
        )
    }

    pub fn refuse_next(&self, reason: &str) {
        self.state
            .script
            .lock()
            .unwrap()
            .push_back(Some(reason.to_string()));
    }

    pub fn accept_next(&self) {
        self.state.script.lock().unwrap().push_back(None);
    }

    pub fn set_accept_by_default(&self, accept: bool) {
        self.state.accept_by_default.store(accept, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<Url> {
        self.state.urls.lock().unwrap().clone()
    }

    /// Virtual time of every connect attempt.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.state.connect_times.lock().unwrap().clone()
    }

    /// Connections accepted from now on fail every send after `n` of them.
    pub fn limit_sends(&self, n: usize) {
        *self.state.send_budget.lock().unwrap() = Some(n);
    }

    /// Waits for the next accepted connection.
    pub async fn next_peer(&mut self) -> MockPeer {
        tokio::time::timeout(WAIT_LIMIT, self.peers.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    pub fn try_next_peer(&mut self) -> Option<MockPeer> {
        self.peers.try_recv().ok()
    }
}

pub struct MockConnector {
    state: Arc<ServerState>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> RealtimeResult<Box<dyn Transport>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.urls.lock().unwrap().push(url.clone());
        self.state.connect_times.lock().unwrap().push(Instant::now());

        let scripted = self.state.script.lock().unwrap().pop_front();
        let refusal = match scripted {
            Some(step) => step,
            None if self.state.accept_by_default.load(Ordering::SeqCst) => None,
            None => Some("connection refused".to_string()),
        };
        if let Some(reason) = refusal {
            return Err(RealtimeError::ConnectionFailed(reason));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let fail_send = Arc::new(AtomicBool::new(false));

        let peer = MockPeer {
            url: url.clone(),
            events: events_tx,
            sent: sent_rx,
            fail_send: fail_send.clone(),
        };
        let _ = self.state.peers.send(peer);

        Ok(Box::new(MockTransport {
            events: events_rx,
            sent: sent_tx,
            fail_send,
            budget: *self.state.send_budget.lock().unwrap(),
        }))
    }
}

// =============================================================================
// Peer (server end of one connection)
// =============================================================================

pub struct MockPeer {
    pub url: Url,
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: mpsc::UnboundedReceiver<Sent>,
    fail_send: Arc<AtomicBool>,
}

impl MockPeer {
    pub fn push(&self, message: &Message) {
        self.push_raw(&message.to_json().unwrap());
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Message(text.to_string()));
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.events.send(TransportEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    pub fn error(&self, reason: &str) {
        let _ = self.events.send(TransportEvent::Error(reason.to_string()));
    }

    /// Makes every following client send fail.
    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub async fn recv(&mut self) -> Sent {
        tokio::time::timeout(WAIT_LIMIT, self.sent.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("transport dropped")
    }

    /// Next text frame, failing on a close frame.
    pub async fn recv_message(&mut self) -> Message {
        match self.recv().await {
            Sent::Text(message) => message,
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    pub fn try_recv(&mut self) -> Option<Sent> {
        self.sent.try_recv().ok()
    }

    /// Everything sent so far, without waiting.
    pub fn drain(&mut self) -> Vec<Sent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

// =============================================================================
// Transport (client end)
// =============================================================================

struct MockTransport {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    sent: mpsc::UnboundedSender<Sent>,
    fail_send: Arc<AtomicBool>,
    budget: Option<usize>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: String) -> RealtimeResult<()> {
        if self.fail_send.load(Ordering::SeqCst) || self.budget == Some(0) {
            return Err(RealtimeError::WebSocketError("send failed".into()));
        }
        if let Some(remaining) = self.budget.as_mut() {
            *remaining -= 1;
        }
        let message = Message::from_json(&text)?;
        self.sent
            .send(Sent::Text(message))
            .map_err(|_| RealtimeError::Disconnected)
    }

    async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => TransportEvent::Closed {
                code: 1006,
                reason: String::new(),
            },
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> RealtimeResult<()> {
        let _ = self.sent.send(Sent::Close {
            code,
            reason: reason.to_string(),
        });
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Heartbeat off, 1s fixed reconnect, three attempts.
pub fn test_config() -> RealtimeConfig {
    let mut config = RealtimeConfig::new(TEST_URL);
    config.heartbeat.enabled = false;
    config.reconnect.interval_ms = 1_000;
    config.reconnect.max_attempts = 3;
    config
}

pub fn spawn_client(config: RealtimeConfig, connector: Arc<MockConnector>) -> RealtimeHandle {
    spawn_with_storage(config, connector, Arc::new(MemoryStore::new()))
}

pub fn spawn_with_storage(
    config: RealtimeConfig,
    connector: Arc<MockConnector>,
    storage: Arc<dyn KeyValueStore>,
) -> RealtimeHandle {
    RealtimeClient::builder(config)
        .with_connector(connector)
        .with_storage(storage)
        .spawn()
        .expect("spawn client")
}

pub async fn wait_for_phase(handle: &RealtimeHandle, phase: ConnectionPhase) -> ConnectionStatus {
    let mut changes = handle.status_changes();
    let status = tokio::time::timeout(WAIT_LIMIT, changes.wait_for(|s| s.phase == phase))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {phase}"))
        .expect("status channel closed")
        .clone();
    status
}

/// Shorthand for `data.channel`-routed pushes.
pub fn channel_message(kind: &str, channel: &str, data: serde_json::Value) -> Message {
    let mut data = data;
    data["channel"] = serde_json::Value::String(channel.to_string());
    Message::new(kind, data)
}
