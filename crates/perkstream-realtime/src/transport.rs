//! # WebSocket Transport
//!
//! The socket seam of the client. The actor only sees [`Connector`] and
//! [`Transport`], so tests drive it with a scripted in-memory connection.
//!
//! ## Event Stream
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Transport::next_event() sequence                       │
//! │                                                                         │
//! │  Connector::connect(url) ──► Ok(transport)  │  Err(ConnectionFailed /   │
//! │                                             │      Timeout / TlsError)  │
//! │                                                                         │
//! │  next_event():                                                          │
//! │    Message(text)  ×N        text frames (binary accepted if UTF-8)     │
//! │    Error(reason)            read failed; the next call yields Closed   │
//! │    Closed{code, reason}     close frame, or 1006 if none was received  │
//! │                                                                         │
//! │  Ping/Pong are answered by tungstenite and never surface here.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use perkstream_core::ABNORMAL_CLOSURE;

use crate::error::{RealtimeError, RealtimeResult};

/// Close code used when the peer sent a close frame without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

// =============================================================================
// Traits
// =============================================================================

/// Something read from an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Inbound text frame.
    Message(String),

    /// Connection ended. Terminal.
    Closed { code: u16, reason: String },

    /// Read error. Followed by `Closed`.
    Error(String),
}

/// An open bidirectional text connection.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> RealtimeResult<()>;

    /// Waits for the next event. Must be cancel-safe.
    async fn next_event(&mut self) -> TransportEvent;

    async fn close(&mut self, code: u16, reason: &str) -> RealtimeResult<()>;
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> RealtimeResult<Box<dyn Transport>>;
}

// =============================================================================
// tokio-tungstenite Implementation
// =============================================================================

/// Connector for `ws://` and `wss://` endpoints.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        WsConnector { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        WsConnector::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> RealtimeResult<Box<dyn Transport>> {
        match timeout(self.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((stream, response))) => {
                debug!(status = ?response.status(), "WebSocket handshake complete");
                Ok(Box::new(WsTransport::new(stream)))
            }
            Ok(Err(e)) => Err(RealtimeError::from(e)),
            Err(_) => Err(RealtimeError::Timeout(self.connect_timeout.as_secs())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Open,
    Failed,
    Finished,
}

/// An established tungstenite connection.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    state: ReadState,
}

impl WsTransport {
    pub fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        WsTransport {
            stream,
            state: ReadState::Open,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> RealtimeResult<()> {
        if self.state != ReadState::Open {
            return Err(RealtimeError::Disconnected);
        }
        self.stream.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        if self.state != ReadState::Open {
            self.state = ReadState::Finished;
            return TransportEvent::Closed {
                code: ABNORMAL_CLOSURE,
                reason: String::new(),
            };
        }

        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return TransportEvent::Message(text.as_str().to_owned());
                }
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return TransportEvent::Message(text),
                    Err(_) => warn!(len = bytes.len(), "Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    self.state = ReadState::Finished;
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                        .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                    debug!(code, reason = %reason, "Received close frame");
                    return TransportEvent::Closed { code, reason };
                }
                Some(Ok(_)) => {
                    // Ping/Pong/raw frames
                }
                Some(Err(e)) => {
                    self.state = ReadState::Failed;
                    return TransportEvent::Error(e.to_string());
                }
                None => {
                    self.state = ReadState::Finished;
                    return TransportEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: String::new(),
                    };
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> RealtimeResult<()> {
        if self.state == ReadState::Finished {
            return Ok(());
        }
        self.state = ReadState::Finished;
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.stream.close(Some(frame)).await?;
        Ok(())
    }
}
