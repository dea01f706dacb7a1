//! CLI, configuration file, listen and send commands
//!
//! This crate provides the `pollsignal` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
