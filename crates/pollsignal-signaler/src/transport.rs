//! HTTP transport to the relay.
//!
//! The relay exposes one mailbox per peer id under `{base}data/{id}`:
//! - `POST` stores a message for that peer
//! - `GET` pops the next pending message, answering with a non-2xx status
//!   or an empty body when there is none
//!
//! This layer only moves bytes. It never retries and never interprets
//! payloads; the polling engine decides what a failure means.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

/// A boxed future, used so [`Transport`] stays object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Network-level failures.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be completed (connect, timeout, body read).
    #[error("request to {url} failed: {message}")]
    Request {
        url: String,
        message: String,
        timeout: bool,
    },

    /// The relay answered a POST with a non-success status.
    #[error("relay answered {status} for {url}")]
    Status { url: String, status: u16 },

    /// A mailbox URL could not be built.
    #[error("invalid mailbox URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    fn request(url: &Url, err: reqwest::Error) -> Self {
        Self::Request {
            url: url.to_string(),
            message: err.to_string(),
            timeout: err.is_timeout(),
        }
    }

    /// Returns true if the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request { timeout: true, .. })
    }
}

/// Minimal relay client.
///
/// Implementations must be `Send + Sync`: the send path and the polling loop
/// use the same transport concurrently.
pub trait Transport: Send + Sync {
    /// Stores `body` in the mailbox `mailbox`.
    fn post<'a>(&'a self, mailbox: &'a str, body: Vec<u8>) -> BoxFuture<'a, TransportResult<()>>;

    /// Fetches the next pending message of `mailbox`.
    ///
    /// Returns `Ok(None)` when there is nothing to read yet.
    fn get<'a>(&'a self, mailbox: &'a str) -> BoxFuture<'a, TransportResult<Option<Vec<u8>>>>;
}

/// [`Transport`] over HTTP(S) with `reqwest`.
///
/// The underlying client keeps connections alive between polls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    /// Creates a transport for the relay at `base`, which must end with `/`.
    pub fn new(base: Url, timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(concat!("pollsignal/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self { client, base })
    }

    /// Returns the relay base address.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Builds `{base}data/{mailbox}`, percent-encoding the mailbox id.
    pub fn mailbox_url(&self, mailbox: &str) -> TransportResult<Url> {
        Ok(self
            .base
            .join(&format!("data/{}", urlencoding::encode(mailbox)))?)
    }

    async fn post_inner(&self, mailbox: &str, body: Vec<u8>) -> TransportResult<()> {
        let url = self.mailbox_url(mailbox)?;
        trace!(url = %url, bytes = body.len(), "POST");

        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::request(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(url = %url, status = status.as_u16(), "Message posted");
        Ok(())
    }

    async fn get_inner(&self, mailbox: &str) -> TransportResult<Option<Vec<u8>>> {
        let url = self.mailbox_url(mailbox)?;
        trace!(url = %url, "GET");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError::request(&url, e))?;

        // Relays answer 404 for an empty mailbox.
        let status = response.status();
        if !status.is_success() {
            trace!(status = status.as_u16(), "Mailbox empty");
            return Ok(None);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::request(&url, e))?;

        if body.is_empty() {
            Ok(None)
        } else {
            Ok(Some(body.to_vec()))
        }
    }
}

impl Transport for HttpTransport {
    fn post<'a>(&'a self, mailbox: &'a str, body: Vec<u8>) -> BoxFuture<'a, TransportResult<()>> {
        Box::pin(self.post_inner(mailbox, body))
    }

    fn get<'a>(&'a self, mailbox: &'a str) -> BoxFuture<'a, TransportResult<Option<Vec<u8>>>> {
        Box::pin(self.get_inner(mailbox))
    }
}
