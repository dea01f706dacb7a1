//! Client error types.

use pollsignal_protocol::ProtocolError;
use pollsignal_signaler::SignalerError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Signaler error.
    #[error(transparent)]
    Signaler(#[from] SignalerError),

    /// A message could not be built or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Command output could not be serialized.
    #[error("failed to format output: {0}")]
    Output(#[from] serde_json::Error),

    /// The polling session ended on its own.
    #[error("polling stopped: {0}")]
    SessionEnded(String),

    /// Invalid command input.
    #[error("invalid input: {0}")]
    Input(String),
}
