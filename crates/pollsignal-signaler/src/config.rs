//! Signaler configuration.

use std::time::Duration;

use url::Url;

use crate::error::{SignalerError, SignalerResult};
use crate::poller::FailurePolicy;

/// Default spacing between poll requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default per-request timeout for relay calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the notification channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Endpoint configuration for a [`Signaler`](crate::Signaler).
///
/// The configuration is copied into the signaler on construction and cannot
/// change afterwards, so it is fixed for every polling session.
#[derive(Debug, Clone)]
pub struct SignalerConfig {
    /// Relay base address. Must end with `/`, e.g. `http://127.0.0.1:3000/`.
    pub server_address: String,

    /// Mailbox polled for incoming messages.
    pub local_id: String,

    /// Mailbox that outgoing messages are posted to.
    pub remote_id: String,

    /// Minimum spacing between the starts of two poll requests.
    pub poll_interval: Duration,

    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,

    /// What the polling loop does when the relay cannot be reached.
    pub failure_policy: FailurePolicy,

    /// Number of notifications buffered per subscriber.
    pub event_capacity: usize,
}

impl Default for SignalerConfig {
    fn default() -> Self {
        Self {
            server_address: "http://127.0.0.1:3000/".to_string(),
            local_id: String::new(),
            remote_id: String::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            failure_policy: FailurePolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SignalerConfig {
    /// Creates a configuration for the given relay address.
    pub fn new(server_address: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            ..Default::default()
        }
    }

    /// Builder: set the local peer id.
    pub fn with_local_id(mut self, id: impl Into<String>) -> Self {
        self.local_id = id.into();
        self
    }

    /// Builder: set the remote peer id.
    pub fn with_remote_id(mut self, id: impl Into<String>) -> Self {
        self.remote_id = id.into();
        self
    }

    /// Builder: set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builder: set the HTTP request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder: set the transport failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Builder: set the notification buffer size.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Parses and checks the relay address.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the address is not an absolute
    /// `http`/`https` URL ending with `/`.
    pub fn base_url(&self) -> SignalerResult<Url> {
        if !self.server_address.ends_with('/') {
            return Err(SignalerError::config(format!(
                "server address must end with '/', e.g. 'http://ip:port/' (got '{}')",
                self.server_address
            )));
        }

        let url = Url::parse(&self.server_address).map_err(|e| {
            SignalerError::config(format!(
                "invalid server address '{}': {}",
                self.server_address, e
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(SignalerError::config(format!(
                "unsupported scheme '{}' in server address",
                url.scheme()
            )));
        }

        Ok(url)
    }

    /// Checks everything that does not depend on peer ids.
    pub fn validate(&self) -> SignalerResult<()> {
        self.base_url()?;
        if self.poll_interval.is_zero() {
            return Err(SignalerError::config("poll interval must be positive"));
        }
        if self.event_capacity == 0 {
            return Err(SignalerError::config("event capacity must be positive"));
        }
        if let FailurePolicy::Retry(retry) = &self.failure_policy {
            retry.validate()?;
        }
        Ok(())
    }

    /// Returns the local id, or a configuration error if it is blank.
    pub fn require_local_id(&self) -> SignalerResult<&str> {
        require_id("local", &self.local_id)
    }

    /// Returns the remote id, or a configuration error if it is blank.
    pub fn require_remote_id(&self) -> SignalerResult<&str> {
        require_id("remote", &self.remote_id)
    }
}

fn require_id<'a>(which: &str, id: &'a str) -> SignalerResult<&'a str> {
    if id.trim().is_empty() {
        Err(SignalerError::config(format!("{which} peer id is not set")))
    } else {
        Ok(id)
    }
}
