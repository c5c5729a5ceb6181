//! # Realtime Error Types
//!
//! Error types for the realtime client.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Realtime Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  SerializationFailed    │ │
//! │  │  InvalidUrl     │  │  Disconnected   │  │  Message (core)         │ │
//! │  │  ConfigLoad/Save│  │  Timeout, TLS   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐  │
//! │  │    Storage      │  │              Internal                       │  │
//! │  │                 │  │                                             │  │
//! │  │  Storage        │  │  ShuttingDown                               │  │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expected conditions (offline send, full queue, unknown subscription) are
//! not errors; they surface as `bool` returns on the handle.

use perkstream_core::MessageError;
use thiserror::Error;

/// Result type alias for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

#[derive(Debug, Error)]
pub enum RealtimeError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid client configuration.
    #[error("Invalid realtime configuration: {0}")]
    InvalidConfig(String),

    /// Endpoint is not a usable ws:// or wss:// URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Failed to establish the WebSocket connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation needs an open connection.
    #[error("Not connected to realtime server")]
    Disconnected,

    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error(transparent)]
    Message(#[from] MessageError),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Key-value store read or write failed.
    #[error("Storage error: {0}")]
    Storage(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// The client was destroyed.
    #[error("Realtime client is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        RealtimeError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for RealtimeError {
    fn from(err: url::ParseError) -> Self {
        RealtimeError::InvalidUrl(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => RealtimeError::Disconnected,
            WsError::Protocol(p) => RealtimeError::WebSocketError(p.to_string()),
            WsError::Io(io) => RealtimeError::ConnectionFailed(io.to_string()),
            WsError::Tls(tls) => RealtimeError::TlsError(tls.to_string()),
            WsError::Url(u) => RealtimeError::InvalidUrl(u.to_string()),
            other => RealtimeError::WebSocketError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for RealtimeError {
    fn from(err: std::io::Error) -> Self {
        RealtimeError::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for RealtimeError {
    fn from(err: toml::de::Error) -> Self {
        RealtimeError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for RealtimeError {
    fn from(err: toml::ser::Error) -> Self {
        RealtimeError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl RealtimeError {
    /// Returns true if a later connection attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RealtimeError::ConnectionFailed(_)
                | RealtimeError::Disconnected
                | RealtimeError::Timeout(_)
                | RealtimeError::WebSocketError(_)
                | RealtimeError::TlsError(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RealtimeError::InvalidConfig(_)
                | RealtimeError::InvalidUrl(_)
                | RealtimeError::ConfigLoadFailed(_)
                | RealtimeError::ConfigSaveFailed(_)
        )
    }
}
