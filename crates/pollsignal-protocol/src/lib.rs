//! Relay message envelope and wire codec for pollsignal.
//!
//! The relay stores opaque JSON bodies in per-peer mailboxes. Every body is an
//! [`Envelope`]:
//!
//! ```text
//! { "MessageType": 1, "Data": "v=0\r\n...", "IceDataSeparator": "|" }
//! ```
//!
//! `MessageType` is 1 for an offer, 2 for an answer and 3 for an ICE
//! candidate. ICE candidates pack their three fields into `Data` joined by the
//! separator, always in the order content, m-line index, mid.
//!
//! # Example
//!
//! ```rust
//! use pollsignal_core::SdpMessage;
//! use pollsignal_protocol::Envelope;
//!
//! let envelope = Envelope::from_sdp(&SdpMessage::offer("v=0"));
//! let bytes = envelope.to_json().unwrap();
//! let decoded = Envelope::decode(&bytes).unwrap();
//! assert_eq!(decoded.to_sdp().unwrap(), SdpMessage::offer("v=0"));
//! ```

mod envelope;
mod error;

pub use envelope::{Envelope, MessageKind};
pub use error::{ProtocolError, ProtocolResult};

/// Separator joining ICE candidate fields inside `Data`.
pub const ICE_DATA_SEPARATOR: &str = "|";

/// Maximum encoded envelope size (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
