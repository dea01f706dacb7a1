//! Polling signaler: relay transport, polling engine, notifications.
//!
//! This crate lets two WebRTC peers exchange SDP and ICE messages through a
//! dumb HTTP relay that stores messages per peer id:
//! - Outgoing envelopes are POSTed to the remote peer's mailbox
//! - The local mailbox is polled with GET on a fixed interval
//! - Connection, message and failure notifications are broadcast to
//!   subscribers
//!
//! # Example
//!
//! ```rust,no_run
//! use pollsignal_core::SdpMessage;
//! use pollsignal_signaler::{Signaler, SignalerConfig, SignalerEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SignalerConfig::new("http://127.0.0.1:3000/")
//!         .with_local_id("client")
//!         .with_remote_id("server");
//!     let signaler = Signaler::new(config)?;
//!     let mut events = signaler.subscribe();
//!
//!     signaler.start_polling()?;
//!     signaler.send_artifact(SdpMessage::offer("v=0"))?.await??;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let SignalerEvent::MessageReceived(envelope) = event {
//!             println!("{}", envelope.data);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod events;
mod negotiation;
mod poller;
mod signaler;
mod transport;

#[cfg(test)]
mod testing;

pub use config::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT, SignalerConfig,
};
pub use error::{SignalerError, SignalerResult};
pub use events::{Notifier, SignalerEvent};
pub use negotiation::{Negotiator, PeerConnection, PeerError};
pub use poller::{FailurePolicy, PollState, PollingEngine, RetryPolicy};
pub use signaler::Signaler;
pub use transport::{BoxFuture, HttpTransport, Transport, TransportError, TransportResult};
