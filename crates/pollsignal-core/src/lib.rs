//! Core types: SDP and ICE negotiation artifacts, tracing setup

pub mod ice;
pub mod sdp;
pub mod tracing;

pub use ice::IceCandidate;
pub use sdp::{SdpKind, SdpMessage, UnknownSdpKind};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

/// A negotiation artifact exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalArtifact {
    /// An SDP offer or answer.
    Sdp(SdpMessage),
    /// A trickled ICE candidate.
    Ice(IceCandidate),
}

impl From<SdpMessage> for SignalArtifact {
    fn from(message: SdpMessage) -> Self {
        Self::Sdp(message)
    }
}

impl From<IceCandidate> for SignalArtifact {
    fn from(candidate: IceCandidate) -> Self {
        Self::Ice(candidate)
    }
}
