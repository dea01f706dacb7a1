//! ICE candidate artifact.

use serde::{Deserialize, Serialize};

/// A trickled ICE candidate.
///
/// Mirrors the `RTCIceCandidateInit` triple: candidate line, the index of the
/// media line it belongs to, and that media line's `mid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IceCandidate {
    /// The `candidate:` attribute line.
    pub content: String,
    /// Zero-based index of the associated `m=` line.
    pub sdp_mline_index: u32,
    /// Media stream identification tag of the associated `m=` line.
    pub sdp_mid: String,
}

impl IceCandidate {
    /// Creates a new ICE candidate.
    pub fn new(content: impl Into<String>, sdp_mline_index: u32, sdp_mid: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sdp_mline_index,
            sdp_mid: sdp_mid.into(),
        }
    }
}
