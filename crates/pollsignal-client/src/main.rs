//! pollsignal CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use pollsignal_client::cli::{Cli, Command, ConfigAction};
use pollsignal_client::commands;
use pollsignal_client::config::ClientConfig;
use pollsignal_client::error::ClientResult;
use pollsignal_core::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let mut config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    config.apply_cli(&cli);

    if let Err(e) = init_tracing(cli.tracing_config(config.debug)) {
        eprintln!("warning: failed to initialize logging: {}", e);
    }

    match cli.command {
        Command::Listen => commands::listen::run(&config).await,
        Command::Send { message } => commands::send::run(&config, message).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
