//! # Error Types
//!
//! Errors raised by the pure message layer. Transport, storage and
//! configuration failures live in `perkstream-realtime`.

use thiserror::Error;

/// Result alias for message encoding/decoding.
pub type MessageResult<T> = Result<T, MessageError>;

/// Message encoding and decoding failures.
#[derive(Debug, Error)]
pub enum MessageError {
    /// Inbound text was not a valid message envelope.
    #[error("Malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Payload could not be serialized.
    #[error("Failed to encode {kind} message: {source}")]
    Encode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// `data` did not match the payload schema for its type.
    #[error("Failed to decode {kind} payload: {source}")]
    Decode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// Asked to decode a payload of a different type.
    #[error("Unexpected message type: expected {expected}, got {actual}")]
    KindMismatch { expected: String, actual: String },
}
