//! Protocol error types.

use pollsignal_core::UnknownSdpKind;
use thiserror::Error;

use crate::envelope::MessageKind;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload could not be parsed into the envelope schema.
    #[error("malformed message: {reason}")]
    MalformedMessage { reason: String },

    /// Discriminant or type name is not an offer, answer or ICE candidate.
    #[error("unknown message kind: {0}")]
    UnknownMessageKind(String),

    /// Envelope kind cannot be converted to the requested artifact.
    #[error("wrong message kind: expected {expected}, got {actual}")]
    WrongMessageKind {
        expected: &'static str,
        actual: MessageKind,
    },

    /// Message exceeds maximum allowed size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Failed to serialize an envelope to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Creates a malformed message error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Returns true if the error came from a payload that failed to decode.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage { .. } | Self::UnknownMessageKind(_) | Self::MessageTooLarge { .. }
        )
    }
}

impl From<UnknownSdpKind> for ProtocolError {
    fn from(err: UnknownSdpKind) -> Self {
        Self::UnknownMessageKind(err.0)
    }
}
