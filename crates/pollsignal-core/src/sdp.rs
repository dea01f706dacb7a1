//! Session description artifacts.
//!
//! An [`SdpMessage`] is what the peer connection produces when a local
//! description is ready and what it consumes when a remote description
//! arrives. Only offers and answers travel over the relay.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a session description is an offer or an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// SDP offer, sent by the side initiating negotiation.
    Offer,
    /// SDP answer, sent in reply to an offer.
    Answer,
}

impl SdpKind {
    /// Returns the lowercase type name used by WebRTC stacks.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
        }
    }
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a type name is neither "offer" nor "answer".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown session description type '{0}'")]
pub struct UnknownSdpKind(pub String);

impl FromStr for SdpKind {
    type Err = UnknownSdpKind;

    /// Parses an informal type name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("offer") {
            Ok(Self::Offer)
        } else if s.eq_ignore_ascii_case("answer") {
            Ok(Self::Answer)
        } else {
            Err(UnknownSdpKind(s.to_string()))
        }
    }
}

/// An SDP offer or answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpMessage {
    /// Offer or answer.
    pub kind: SdpKind,
    /// Raw SDP text.
    pub content: String,
}

impl SdpMessage {
    /// Creates a new session description.
    pub fn new(kind: SdpKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// Creates an offer.
    pub fn offer(content: impl Into<String>) -> Self {
        Self::new(SdpKind::Offer, content)
    }

    /// Creates an answer.
    pub fn answer(content: impl Into<String>) -> Self {
        Self::new(SdpKind::Answer, content)
    }
}
