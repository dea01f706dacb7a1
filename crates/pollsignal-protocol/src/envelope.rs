//! The relay envelope and its mapping to negotiation artifacts.

use std::fmt;

use pollsignal_core::{IceCandidate, SdpKind, SdpMessage, SignalArtifact};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::{ICE_DATA_SEPARATOR, MAX_MESSAGE_SIZE};

/// Kind of payload carried by an [`Envelope`].
///
/// Serialized as its integer discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MessageKind {
    /// Unknown message; never produced by this crate and rejected on decode.
    Unknown = 0,
    /// SDP offer.
    Offer = 1,
    /// SDP answer.
    Answer = 2,
    /// Trickled ICE candidate.
    IceCandidate = 3,
}

impl MessageKind {
    /// Maps an informal type name ("offer", "answer", any case) to a kind.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownMessageKind`] for any other name.
    pub fn from_type_name(name: &str) -> ProtocolResult<Self> {
        Ok(name.parse::<SdpKind>()?.into())
    }

    /// Returns the lowercase name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice",
        }
    }

    /// Maps a wire discriminant to one of the three deliverable kinds.
    fn from_wire(discriminant: i64) -> ProtocolResult<Self> {
        match discriminant {
            1 => Ok(Self::Offer),
            2 => Ok(Self::Answer),
            3 => Ok(Self::IceCandidate),
            other => Err(ProtocolError::UnknownMessageKind(other.to_string())),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SdpKind> for MessageKind {
    fn from(kind: SdpKind) -> Self {
        match kind {
            SdpKind::Offer => Self::Offer,
            SdpKind::Answer => Self::Answer,
        }
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unknown),
            other => Self::from_wire(i64::from(other)),
        }
    }
}

/// Wire payload stored in a relay mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Payload discriminant.
    #[serde(rename = "MessageType")]
    pub kind: MessageKind,
    /// SDP text, or the joined ICE candidate fields.
    #[serde(rename = "Data")]
    pub data: String,
    /// Separator used to join ICE candidate fields.
    #[serde(rename = "IceDataSeparator")]
    pub separator: String,
}

/// Envelope shape as it arrives, before the discriminant is checked.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "MessageType")]
    kind: i64,
    #[serde(rename = "Data")]
    data: String,
    #[serde(rename = "IceDataSeparator")]
    separator: String,
}

impl Envelope {
    /// Wraps an SDP offer or answer.
    pub fn from_sdp(message: &SdpMessage) -> Self {
        Self {
            kind: message.kind.into(),
            data: message.content.clone(),
            separator: ICE_DATA_SEPARATOR.to_string(),
        }
    }

    /// Wraps an ICE candidate as `content|index|mid`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedMessage`] if the content or mid
    /// contains the separator, since the result could not be split back.
    pub fn from_ice(candidate: &IceCandidate) -> ProtocolResult<Self> {
        for (field, value) in [("content", &candidate.content), ("mid", &candidate.sdp_mid)] {
            if value.contains(ICE_DATA_SEPARATOR) {
                return Err(ProtocolError::malformed(format!(
                    "ICE candidate {field} contains separator '{ICE_DATA_SEPARATOR}'"
                )));
            }
        }

        let index = candidate.sdp_mline_index.to_string();
        let data = [
            candidate.content.as_str(),
            index.as_str(),
            candidate.sdp_mid.as_str(),
        ]
        .join(ICE_DATA_SEPARATOR);

        Ok(Self {
            kind: MessageKind::IceCandidate,
            data,
            separator: ICE_DATA_SEPARATOR.to_string(),
        })
    }

    /// Wraps any negotiation artifact.
    pub fn encode(artifact: &SignalArtifact) -> ProtocolResult<Self> {
        match artifact {
            SignalArtifact::Sdp(message) => Ok(Self::from_sdp(message)),
            SignalArtifact::Ice(candidate) => Self::from_ice(candidate),
        }
    }

    /// Parses an envelope from its JSON wire form.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::MessageTooLarge`] above [`MAX_MESSAGE_SIZE`]
    /// - [`ProtocolError::MalformedMessage`] if the JSON does not match the
    ///   schema or the separator is empty
    /// - [`ProtocolError::UnknownMessageKind`] if `MessageType` is not 1, 2 or 3
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: bytes.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let raw: RawEnvelope =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::malformed(e.to_string()))?;

        let kind = MessageKind::from_wire(raw.kind)?;
        if raw.separator.is_empty() {
            return Err(ProtocolError::malformed("empty IceDataSeparator"));
        }

        Ok(Self {
            kind,
            data: raw.data,
            separator: raw.separator,
        })
    }

    /// Serializes the envelope to its JSON wire form.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        if json.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: json.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(json)
    }

    /// Extracts the SDP offer or answer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::WrongMessageKind`] unless this is an offer or
    /// answer.
    pub fn to_sdp(&self) -> ProtocolResult<SdpMessage> {
        let kind = match self.kind {
            MessageKind::Offer => SdpKind::Offer,
            MessageKind::Answer => SdpKind::Answer,
            actual => {
                return Err(ProtocolError::WrongMessageKind {
                    expected: "offer or answer",
                    actual,
                });
            }
        };
        Ok(SdpMessage::new(kind, self.data.clone()))
    }

    /// Extracts the ICE candidate.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::WrongMessageKind`] unless this is an ICE
    /// message, and [`ProtocolError::MalformedMessage`] if `Data` does not
    /// split into content, index and mid.
    pub fn to_ice(&self) -> ProtocolResult<IceCandidate> {
        if self.kind != MessageKind::IceCandidate {
            return Err(ProtocolError::WrongMessageKind {
                expected: "ice candidate",
                actual: self.kind,
            });
        }
        if self.separator.is_empty() {
            return Err(ProtocolError::malformed("empty IceDataSeparator"));
        }

        let parts: Vec<&str> = self.data.split(self.separator.as_str()).collect();
        let [content, index, mid] = parts.as_slice() else {
            return Err(ProtocolError::malformed(format!(
                "ICE data has {} fields, expected 3",
                parts.len()
            )));
        };

        let sdp_mline_index = index
            .parse::<u32>()
            .map_err(|e| ProtocolError::malformed(format!("invalid m-line index '{index}': {e}")))?;

        Ok(IceCandidate::new(*content, sdp_mline_index, *mid))
    }

    /// Extracts whichever artifact this envelope carries.
    pub fn to_artifact(&self) -> ProtocolResult<SignalArtifact> {
        match self.kind {
            MessageKind::IceCandidate => self.to_ice().map(SignalArtifact::Ice),
            _ => self.to_sdp().map(SignalArtifact::Sdp),
        }
    }
}

impl From<&SdpMessage> for Envelope {
    fn from(message: &SdpMessage) -> Self {
        Self::from_sdp(message)
    }
}
