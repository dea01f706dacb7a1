//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pollsignal_core::TracingConfig;
use tracing::Level;

/// pollsignal - WebRTC signaling over a polling HTTP relay
#[derive(Debug, Parser)]
#[command(name = "pollsignal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "POLLSIGNAL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "POLLSIGNAL_JSON_LOGS", global = true)]
    pub json_logs: bool,

    // --- Relay overrides ---
    /// Relay base address, ending with '/'
    #[arg(long, env = "POLLSIGNAL_SERVER", global = true)]
    pub server: Option<String>,

    /// Id of the mailbox polled for incoming messages
    #[arg(long, env = "POLLSIGNAL_LOCAL_ID", global = true)]
    pub local_id: Option<String>,

    /// Id of the mailbox outgoing messages are sent to
    #[arg(long, env = "POLLSIGNAL_REMOTE_ID", global = true)]
    pub remote_id: Option<String>,

    /// Minimum delay between polls in milliseconds
    #[arg(long, env = "POLLSIGNAL_POLL_INTERVAL_MS", global = true)]
    pub poll_interval_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Logging setup for this invocation; `debug` is the merged file/flag value.
    pub fn tracing_config(&self, debug: bool) -> TracingConfig {
        if self.json_logs {
            let level = if debug { Level::DEBUG } else { Level::INFO };
            TracingConfig::service().with_level(level)
        } else {
            TracingConfig::cli(debug)
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the local mailbox and print received messages as JSON lines
    Listen,

    /// Send one message to the remote peer
    Send {
        #[command(subcommand)]
        message: SendMessage,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Messages that can be sent.
#[derive(Debug, Subcommand)]
pub enum SendMessage {
    /// Send an SDP offer
    Offer {
        /// File containing the SDP (reads stdin when omitted)
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Send an SDP answer
    Answer {
        /// File containing the SDP (reads stdin when omitted)
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Send an ICE candidate
    Ice {
        /// Candidate line, e.g. "candidate:1 1 UDP 2122 10.0.0.1 5000 typ host"
        #[arg(long)]
        candidate: String,

        /// Index of the media line the candidate belongs to
        #[arg(long)]
        mline_index: u32,

        /// Media stream id the candidate belongs to
        #[arg(long)]
        mid: String,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
