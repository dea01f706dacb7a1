//! Signaler notifications.
//!
//! Each [`Signaler`](crate::Signaler) owns one [`Notifier`]: a broadcast
//! channel that any number of observers subscribe to, plus the atomic
//! "connected" flag shared by the send and poll paths.
//!
//! Emitting never blocks and never fails. With no subscribers an event is
//! dropped; a subscriber that falls more than the channel capacity behind
//! sees `RecvError::Lagged` on its own receiver, without affecting the
//! signaler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pollsignal_protocol::Envelope;
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::SignalerError;

/// A notification published by the signaler.
#[derive(Debug, Clone)]
pub enum SignalerEvent {
    /// First successful relay exchange of the session (send or poll).
    Connected,
    /// The session ended, or a send failed.
    Disconnected,
    /// A message was pulled from the local mailbox.
    MessageReceived(Envelope),
    /// The polling loop has fully unwound and may be started again.
    PollingDone,
    /// Something went wrong. Cancellation is never reported here.
    Failure(Arc<SignalerError>),
}

impl SignalerEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::MessageReceived(_) => "message_received",
            Self::PollingDone => "polling_done",
            Self::Failure(_) => "failure",
        }
    }
}

/// Per-signaler notification hub.
#[derive(Debug)]
pub struct Notifier {
    tx: broadcast::Sender<SignalerEvent>,
    connected: AtomicBool,
}

impl Notifier {
    /// Creates a notifier buffering `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            connected: AtomicBool::new(false),
        }
    }

    /// Returns a new receiver for all events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SignalerEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event to all current subscribers.
    pub fn emit(&self, event: SignalerEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => trace!(event = name, receivers, "Event emitted"),
            Err(_) => trace!(event = name, "Event dropped, no subscribers"),
        }
    }

    /// Flips the connected flag 0→1 and emits `Connected` if this call won.
    ///
    /// Returns true only for the call that performed the transition.
    pub fn mark_connected(&self) -> bool {
        let won = self
            .connected
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.emit(SignalerEvent::Connected);
        }
        won
    }

    /// Clears the connected flag so the next session can fire `Connected` again.
    pub fn reset_connected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Returns the current value of the connected flag.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Emits a failure notification.
    pub fn failure(&self, error: SignalerError) {
        self.emit(SignalerEvent::Failure(Arc::new(error)));
    }
}
