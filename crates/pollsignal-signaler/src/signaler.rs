//! Signaling coordinator.
//!
//! A [`Signaler`] ties one relay endpoint to one local/remote peer pair:
//! outgoing envelopes are posted to the remote mailbox, incoming ones are
//! pulled from the local mailbox by the [`PollingEngine`] and published as
//! [`SignalerEvent`]s.

use std::sync::Arc;

use pollsignal_core::SignalArtifact;
use pollsignal_protocol::Envelope;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SignalerConfig;
use crate::error::{SignalerError, SignalerResult};
use crate::events::{Notifier, SignalerEvent};
use crate::poller::{PollState, PollingEngine};
use crate::transport::{HttpTransport, Transport};

/// Signaling endpoint over a polling HTTP relay.
///
/// Cloning yields another handle to the same endpoint; all clones share the
/// polling engine, the connected flag and the subscribers.
#[derive(Clone)]
pub struct Signaler {
    config: Arc<SignalerConfig>,
    transport: Arc<dyn Transport>,
    notifier: Arc<Notifier>,
    engine: PollingEngine,
}

impl std::fmt::Debug for Signaler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signaler")
            .field("server_address", &self.config.server_address)
            .field("local_id", &self.config.local_id)
            .field("remote_id", &self.config.remote_id)
            .field("state", &self.engine.state())
            .finish()
    }
}

impl Signaler {
    /// Creates a signaler talking HTTP to `config.server_address`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the address or timings are invalid.
    pub fn new(config: SignalerConfig) -> SignalerResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.base_url()?, config.request_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a signaler over a custom transport.
    pub fn with_transport(config: SignalerConfig, transport: Arc<dyn Transport>) -> SignalerResult<Self> {
        config.validate()?;

        let notifier = Arc::new(Notifier::new(config.event_capacity));
        let engine = PollingEngine::new(
            config.local_id.clone(),
            config.poll_interval,
            config.failure_policy.clone(),
            transport.clone(),
            notifier.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            transport,
            notifier,
            engine,
        })
    }

    /// Returns the configuration this signaler was built with.
    pub fn config(&self) -> &SignalerConfig {
        &self.config
    }

    /// Subscribes to notifications emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SignalerEvent> {
        self.notifier.subscribe()
    }

    /// Returns true once a relay exchange succeeded in the current session.
    pub fn is_connected(&self) -> bool {
        self.notifier.is_connected()
    }

    /// Starts polling the local mailbox.
    ///
    /// Returns `Ok(false)` without side effects if polling is already active.
    ///
    /// # Errors
    ///
    /// Fails if either peer id is blank or no Tokio runtime is running.
    pub fn start_polling(&self) -> SignalerResult<bool> {
        self.start(None)
    }

    /// Like [`start_polling`](Self::start_polling), but the session also
    /// stops when `parent` is cancelled.
    pub fn start_polling_with(&self, parent: &CancellationToken) -> SignalerResult<bool> {
        self.start(Some(parent))
    }

    fn start(&self, parent: Option<&CancellationToken>) -> SignalerResult<bool> {
        self.config.require_local_id()?;
        self.config.require_remote_id()?;
        self.engine.start(parent)
    }

    /// Requests the polling loop to stop.
    ///
    /// Returns true if this call initiated the stop. `PollingDone` is
    /// emitted once the loop has unwound.
    pub fn stop_polling(&self) -> bool {
        self.engine.stop()
    }

    /// Returns true while a polling session is running or unwinding.
    pub fn is_polling(&self) -> bool {
        self.engine.is_polling()
    }

    /// Returns the polling state. A cancelled session reads `Stopping`
    /// until `PollingDone` fires.
    pub fn state(&self) -> PollState {
        self.engine.state()
    }

    /// Posts an envelope to the remote mailbox in the background.
    ///
    /// Configuration is checked before anything is spawned; delivery
    /// failures are reported both through the returned handle and as
    /// `Failure` + `Disconnected` notifications.
    pub fn send(&self, envelope: Envelope) -> SignalerResult<JoinHandle<SignalerResult<()>>> {
        self.config.require_remote_id()?;
        let runtime = Handle::try_current().map_err(|_| SignalerError::Runtime)?;

        let this = self.clone();
        Ok(runtime.spawn(async move { this.deliver(envelope).await }))
    }

    /// Encodes an SDP message or ICE candidate and sends it.
    pub fn send_artifact(
        &self,
        artifact: impl Into<SignalArtifact>,
    ) -> SignalerResult<JoinHandle<SignalerResult<()>>> {
        let envelope = Envelope::encode(&artifact.into())?;
        self.send(envelope)
    }

    /// Posts an envelope to the remote mailbox and waits for the relay.
    ///
    /// A failed post does not stop polling and does not clear the connected
    /// flag.
    pub async fn deliver(&self, envelope: Envelope) -> SignalerResult<()> {
        let remote_id = self.config.require_remote_id()?;
        let body = envelope.to_json()?;
        let kind = envelope.kind;

        match self.transport.post(remote_id, body).await {
            Ok(()) => {
                debug!(%kind, to = remote_id, "Message sent");
                self.notifier.mark_connected();
                Ok(())
            }
            Err(e) => {
                warn!(%kind, to = remote_id, error = %e, "Failed to send message");
                self.notifier.failure(SignalerError::Transport(e.clone()));
                self.notifier.emit(SignalerEvent::Disconnected);
                Err(e.into())
            }
        }
    }
}
