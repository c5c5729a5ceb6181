//! # Connection Status
//!
//! Snapshot of the client state plus the persisted connection history.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Connection Phases                               │
//! │                                                                         │
//! │  ┌──────┐ connect ┌────────────┐  open   ┌───────────┐                  │
//! │  │ Idle │ ───────►│ Connecting │ ──────► │ Connected │                  │
//! │  └──────┘         └─────┬──────┘         └─────┬─────┘                  │
//! │                         │ fail                 │ close != 1000          │
//! │                         ▼                      ▼                        │
//! │                   ┌──────────────┐  timer  ┌────────────┐               │
//! │                   │ Reconnecting │ ──────► │ Connecting │               │
//! │                   └──────┬───────┘         └────────────┘               │
//! │                          │ max attempts / disconnect / close 1000       │
//! │                          ▼                                              │
//! │                     ┌────────┐                                          │
//! │                     │ Closed │                                          │
//! │                     └────────┘                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `connected`/`connecting`/`reconnecting` flags are all derived from the
//! single `phase`, so at most one of them is ever true.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Phase
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// Never connected.
    #[default]
    Idle,
    Connecting,
    Connected,
    /// Waiting for the reconnect timer.
    Reconnecting,
    /// Disconnected; nothing scheduled.
    Closed,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionPhase::Idle => write!(f, "idle"),
            ConnectionPhase::Connecting => write!(f, "connecting"),
            ConnectionPhase::Connected => write!(f, "connected"),
            ConnectionPhase::Reconnecting => write!(f, "reconnecting"),
            ConnectionPhase::Closed => write!(f, "closed"),
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Point-in-time copy of the client's connection state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub phase: ConnectionPhase,
    pub last_error: Option<String>,
    pub last_connected_at: Option<DateTime<Utc>>,

    /// Reconnect attempts since the last successful connect.
    pub reconnect_attempts: u32,
}

impl ConnectionStatus {
    pub fn connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    pub fn connecting(&self) -> bool {
        self.phase == ConnectionPhase::Connecting
    }

    pub fn reconnecting(&self) -> bool {
        self.phase == ConnectionPhase::Reconnecting
    }
}

// =============================================================================
// History
// =============================================================================

/// Connection history blob persisted between runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionHistory {
    #[serde(default)]
    pub last_connected_at: Option<DateTime<Utc>>,

    /// Endpoint of the last successful connection, without the token.
    #[serde(default)]
    pub last_endpoint: Option<String>,

    #[serde(default)]
    pub total_connections: u64,

    #[serde(default)]
    pub last_error: Option<String>,
}

impl ConnectionHistory {
    /// Records a successful connection.
    pub fn record_connected(&mut self, endpoint: &str, at: DateTime<Utc>) {
        self.last_connected_at = Some(at);
        self.last_endpoint = Some(endpoint.to_string());
        self.total_connections += 1;
    }

    pub fn record_error(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_mutually_exclusive() {
        let phases = [
            ConnectionPhase::Idle,
            ConnectionPhase::Connecting,
            ConnectionPhase::Connected,
            ConnectionPhase::Reconnecting,
            ConnectionPhase::Closed,
        ];
        for phase in phases {
            let status = ConnectionStatus {
                phase,
                ..Default::default()
            };
            let set = [status.connected(), status.connecting(), status.reconnecting()]
                .iter()
                .filter(|f| **f)
                .count();
            assert!(set <= 1, "{phase} sets {set} flags");
        }
    }

    #[test]
    fn test_history_records_connections() {
        let mut history = ConnectionHistory::default();
        let now = Utc::now();
        history.record_connected("wss://rt.example.com/ws", now);
        history.record_connected("wss://rt.example.com/ws", now);

        assert_eq!(history.total_connections, 2);
        assert_eq!(history.last_connected_at, Some(now));
        assert_eq!(history.last_endpoint.as_deref(), Some("wss://rt.example.com/ws"));
    }

    #[test]
    fn test_history_tolerates_missing_fields() {
        let history: ConnectionHistory = serde_json::from_str("{}").unwrap();
        assert_eq!(history, ConnectionHistory::default());

        let history: ConnectionHistory =
            serde_json::from_str(r#"{"totalConnections":3,"lastError":"refused"}"#).unwrap();
        assert_eq!(history.total_connections, 3);
        assert_eq!(history.last_error.as_deref(), Some("refused"));
    }
}
