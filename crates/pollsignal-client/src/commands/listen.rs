//! Listen command: polls the local mailbox and prints what arrives.

use chrono::{DateTime, Utc};
use pollsignal_core::SignalArtifact;
use pollsignal_protocol::Envelope;
use pollsignal_signaler::{Signaler, SignalerEvent};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// One line of `listen` output.
#[derive(Debug, Serialize)]
struct ReceivedLine<'a> {
    received_at: DateTime<Utc>,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sdp: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidate: Option<Candidate<'a>>,
}

#[derive(Debug, Serialize)]
struct Candidate<'a> {
    content: &'a str,
    sdp_mline_index: u32,
    sdp_mid: &'a str,
}

fn format_line(envelope: &Envelope, received_at: DateTime<Utc>) -> ClientResult<String> {
    let artifact = envelope.to_artifact()?;
    let line = match &artifact {
        SignalArtifact::Sdp(message) => ReceivedLine {
            received_at,
            kind: envelope.kind.as_str(),
            sdp: Some(&message.content),
            candidate: None,
        },
        SignalArtifact::Ice(candidate) => ReceivedLine {
            received_at,
            kind: envelope.kind.as_str(),
            sdp: None,
            candidate: Some(Candidate {
                content: &candidate.content,
                sdp_mline_index: candidate.sdp_mline_index,
                sdp_mid: &candidate.sdp_mid,
            }),
        },
    };
    Ok(serde_json::to_string(&line)?)
}

/// Polls until Ctrl-C, then stops and waits for the loop to unwind.
pub async fn run(config: &ClientConfig) -> ClientResult<()> {
    let signaler = Signaler::new(config.signaler_config())?;
    let mut events = signaler.subscribe();

    signaler.start_polling()?;
    info!(
        server = %config.relay.server_address,
        local_id = %config.relay.local_id,
        "Listening"
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut last_failure = None;

    loop {
        tokio::select! {
            res = &mut ctrl_c, if !interrupted => {
                res?;
                info!("Interrupted, stopping");
                interrupted = true;
                signaler.stop_polling();
            }
            event = events.recv() => match event {
                Ok(SignalerEvent::MessageReceived(envelope)) => {
                    println!("{}", format_line(&envelope, Utc::now())?);
                }
                Ok(SignalerEvent::Connected) => info!("Connected to relay"),
                Ok(SignalerEvent::Disconnected) => debug!("Disconnected from relay"),
                Ok(SignalerEvent::Failure(e)) => {
                    warn!(error = %e, "Signaling failure");
                    last_failure = Some(e.to_string());
                }
                Ok(SignalerEvent::PollingDone) => break,
                Err(RecvError::Lagged(missed)) => warn!(missed, "Dropped events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    match last_failure {
        Some(reason) if !interrupted => Err(ClientError::SessionEnded(reason)),
        _ => Ok(()),
    }
}
