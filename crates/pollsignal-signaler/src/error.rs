//! Signaler error types.

use pollsignal_protocol::ProtocolError;
use thiserror::Error;

use crate::negotiation::PeerError;
use crate::transport::TransportError;

/// Result type for signaler operations.
pub type SignalerResult<T> = Result<T, SignalerError>;

/// Errors that can occur in the signaler.
#[derive(Debug, Error)]
pub enum SignalerError {
    /// Missing peer id or malformed server address.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Network-level failure talking to the relay.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The peer connection rejected a negotiation step.
    #[error("negotiation failed: {0}")]
    Peer(#[from] PeerError),

    /// Polling or sending was requested outside a Tokio runtime.
    #[error("no Tokio runtime available")]
    Runtime,

    /// The polling task ended without reaching its normal exit, e.g. it
    /// panicked or its runtime shut down.
    #[error("polling session aborted")]
    Aborted,
}

impl SignalerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true for configuration errors.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
