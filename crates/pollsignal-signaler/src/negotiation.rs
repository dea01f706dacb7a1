//! Offer/answer glue between a signaler and a peer connection.
//!
//! The signaler only moves envelopes. A [`Negotiator`] turns received
//! envelopes into calls on a [`PeerConnection`] and forwards locally
//! produced descriptions and candidates to the remote peer.

use std::sync::Arc;

use pollsignal_core::{IceCandidate, SdpKind, SdpMessage, SignalArtifact};
use pollsignal_protocol::{Envelope, MessageKind, ProtocolError};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SignalerResult;
use crate::events::SignalerEvent;
use crate::signaler::Signaler;
use crate::transport::BoxFuture;

/// Failure reported by a peer connection implementation.
#[derive(Debug, Clone, Error)]
#[error("peer connection: {0}")]
pub struct PeerError(pub String);

impl PeerError {
    /// Creates an error carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The parts of a WebRTC peer connection that negotiation drives.
///
/// Answers produced by `create_answer` are expected to come back through
/// [`Negotiator::on_local_description`].
pub trait PeerConnection: Send + Sync {
    /// Applies a remote offer or answer.
    fn set_remote_description(&self, message: SdpMessage) -> BoxFuture<'_, Result<(), PeerError>>;

    /// Starts creating a local answer to the current remote offer.
    fn create_answer(&self) -> BoxFuture<'_, Result<(), PeerError>>;

    /// Adds a remote ICE candidate.
    fn add_ice_candidate(&self, candidate: IceCandidate) -> BoxFuture<'_, Result<(), PeerError>>;
}

/// Applies remote messages to a peer connection.
pub struct Negotiator<P: PeerConnection> {
    peer: Arc<P>,
    signaler: Signaler,
}

impl<P: PeerConnection> std::fmt::Debug for Negotiator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Negotiator")
            .field("signaler", &self.signaler)
            .finish_non_exhaustive()
    }
}

impl<P: PeerConnection + 'static> Negotiator<P> {
    /// Creates a negotiator applying messages to `peer` and replying through `signaler`.
    pub fn new(peer: Arc<P>, signaler: Signaler) -> Self {
        Self { peer, signaler }
    }

    /// Returns the driven peer connection.
    pub fn peer(&self) -> &Arc<P> {
        &self.peer
    }

    /// Applies one received envelope.
    ///
    /// An offer sets the remote description and then asks for an answer;
    /// an answer only sets the remote description.
    pub async fn apply(&self, envelope: &Envelope) -> SignalerResult<()> {
        match envelope.kind {
            MessageKind::Offer | MessageKind::Answer => {
                let message = envelope.to_sdp()?;
                let is_offer = message.kind == SdpKind::Offer;
                debug!(kind = %message.kind, "Applying remote description");
                self.peer.set_remote_description(message).await?;
                if is_offer {
                    self.peer.create_answer().await?;
                }
            }
            MessageKind::IceCandidate => {
                let candidate = envelope.to_ice()?;
                debug!(mid = %candidate.sdp_mid, index = candidate.sdp_mline_index, "Adding remote candidate");
                self.peer.add_ice_candidate(candidate).await?;
            }
            MessageKind::Unknown => {
                return Err(
                    ProtocolError::UnknownMessageKind(envelope.kind.as_str().to_string()).into(),
                );
            }
        }
        Ok(())
    }

    /// Sends a locally created offer or answer to the remote peer.
    pub fn on_local_description(
        &self,
        message: SdpMessage,
    ) -> SignalerResult<JoinHandle<SignalerResult<()>>> {
        self.signaler.send_artifact(message)
    }

    /// Sends a locally gathered ICE candidate to the remote peer.
    pub fn on_ice_candidate(
        &self,
        candidate: IceCandidate,
    ) -> SignalerResult<JoinHandle<SignalerResult<()>>> {
        self.signaler.send_artifact(SignalArtifact::Ice(candidate))
    }

    /// Applies every received message until `cancel` fires or the signaler
    /// is dropped. Failures to apply a message are logged and skipped.
    pub async fn run(&self, mut events: broadcast::Receiver<SignalerEvent>, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(SignalerEvent::MessageReceived(envelope)) => {
                    if let Err(e) = self.apply(&envelope).await {
                        warn!(kind = %envelope.kind, error = %e, "Failed to apply remote message");
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Negotiator fell behind, messages were dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("Negotiation stopped");
    }
}
