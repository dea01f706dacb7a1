//! Send command: posts one offer, answer or ICE candidate.

use std::io::Read;
use std::path::Path;

use pollsignal_core::{IceCandidate, SdpKind, SdpMessage, SignalArtifact};
use pollsignal_protocol::Envelope;
use pollsignal_signaler::Signaler;
use tracing::debug;

use crate::cli::SendMessage;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Builds the artifact described by the command line.
fn artifact(message: SendMessage, stdin: impl Read) -> ClientResult<SignalArtifact> {
    Ok(match message {
        SendMessage::Offer { file } => read_sdp(SdpKind::Offer, file.as_deref(), stdin)?.into(),
        SendMessage::Answer { file } => read_sdp(SdpKind::Answer, file.as_deref(), stdin)?.into(),
        SendMessage::Ice {
            candidate,
            mline_index,
            mid,
        } => IceCandidate::new(candidate, mline_index, mid).into(),
    })
}

fn read_sdp(kind: SdpKind, file: Option<&Path>, mut stdin: impl Read) -> ClientResult<SdpMessage> {
    let content = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            stdin.read_to_string(&mut buf)?;
            buf
        }
    };

    if content.trim().is_empty() {
        return Err(ClientError::Input(format!("{kind} SDP is empty")));
    }
    Ok(SdpMessage::new(kind, content))
}

/// Sends one message to the configured remote peer.
pub async fn run(config: &ClientConfig, message: SendMessage) -> ClientResult<()> {
    let artifact = artifact(message, std::io::stdin())?;
    let envelope = Envelope::encode(&artifact)?;
    let signaler = Signaler::new(config.signaler_config())?;

    debug!(kind = %envelope.kind, bytes = envelope.data.len(), "Sending");
    let kind = envelope.kind;
    signaler.deliver(envelope).await?;

    println!("sent {} to {}", kind, config.relay.remote_id);
    Ok(())
}
