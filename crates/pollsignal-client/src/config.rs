//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/pollsignal/config.toml` by default. Command-line flags and
//! `POLLSIGNAL_*` environment variables override the file.
//!
//! ```toml
//! [relay]
//! server_address = "http://127.0.0.1:3000/"
//! local_id = "client"
//! remote_id = "server"
//! poll_interval_ms = 500
//!
//! [retry]
//! max_consecutive_failures = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use pollsignal_signaler::{
    DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT, FailurePolicy, RetryPolicy, SignalerConfig,
};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::{ClientError, ClientResult};

/// Configuration for the pollsignal client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Relay and peer settings.
    pub relay: RelaySettings,

    /// Keep polling through relay outages. Absent means stop on the first
    /// failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySettings>,
}

/// Relay and peer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Relay base address, ending with `/`.
    pub server_address: String,

    /// Mailbox polled for incoming messages.
    pub local_id: String,

    /// Mailbox outgoing messages are sent to.
    pub remote_id: String,

    /// Minimum delay between polls in milliseconds.
    pub poll_interval_ms: u64,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            server_address: "http://127.0.0.1:3000/".to_string(),
            local_id: String::new(),
            remote_id: String::new(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// Retry settings for the polling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Failures in a row tolerated before polling stops.
    pub max_consecutive_failures: u32,

    /// Delay after the first failure in milliseconds.
    pub initial_backoff_ms: u64,

    /// Upper bound for the delay in milliseconds.
    pub max_backoff_ms: u64,

    /// Growth factor per additional failure.
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_consecutive_failures: policy.max_consecutive_failures,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            multiplier: policy.multiplier,
        }
    }
}

impl RetrySettings {
    fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_consecutive_failures).with_backoff(
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
            self.multiplier,
        )
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pollsignal")
            .join("config.toml")
    }

    /// Applies command-line and environment overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if cli.debug {
            self.debug = true;
        }
        if let Some(ref server) = cli.server {
            self.relay.server_address = server.clone();
        }
        if let Some(ref id) = cli.local_id {
            self.relay.local_id = id.clone();
        }
        if let Some(ref id) = cli.remote_id {
            self.relay.remote_id = id.clone();
        }
        if let Some(ms) = cli.poll_interval_ms {
            self.relay.poll_interval_ms = ms;
        }
    }

    /// Builds the signaler configuration.
    pub fn signaler_config(&self) -> SignalerConfig {
        let policy = match self.retry {
            Some(ref retry) => FailurePolicy::Retry(retry.to_policy()),
            None => FailurePolicy::Stop,
        };

        SignalerConfig::new(self.relay.server_address.clone())
            .with_local_id(self.relay.local_id.clone())
            .with_remote_id(self.relay.remote_id.clone())
            .with_poll_interval(Duration::from_millis(self.relay.poll_interval_ms))
            .with_request_timeout(Duration::from_secs(self.relay.request_timeout_secs))
            .with_failure_policy(policy)
    }
}
