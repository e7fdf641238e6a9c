use crate::model::participant::ParticipantId;
use crate::model::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Identifier the relay assigns to a published message.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    JoinRequest,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Offer => f.write_str("offer"),
            SignalKind::Answer => f.write_str("answer"),
            SignalKind::IceCandidate => f.write_str("ice-candidate"),
            SignalKind::JoinRequest => f.write_str("join-request"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionKind {
    Offer,
    Answer,
}

/// Session description flattened to `{type, sdp}` so it survives a relay
/// that only stores plain records.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: DescriptionKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptionKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptionKind::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum SignalPayload {
    Description(SessionDescription),
    Candidate(IceCandidate),
    Empty,
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub session: SessionId,
    pub payload: SignalPayload,
    /// Milliseconds since the unix epoch, stamped by the sender.
    pub created_at: u64,
}

impl SignalingMessage {
    fn new(
        kind: SignalKind,
        session: SessionId,
        from: ParticipantId,
        to: ParticipantId,
        payload: SignalPayload,
    ) -> Self {
        Self {
            kind,
            from,
            to,
            session,
            payload,
            created_at: unix_millis(),
        }
    }

    pub fn offer(
        session: SessionId,
        from: ParticipantId,
        to: ParticipantId,
        offer: SessionDescription,
    ) -> Self {
        Self::new(
            SignalKind::Offer,
            session,
            from,
            to,
            SignalPayload::Description(offer),
        )
    }

    pub fn answer(
        session: SessionId,
        from: ParticipantId,
        to: ParticipantId,
        answer: SessionDescription,
    ) -> Self {
        Self::new(
            SignalKind::Answer,
            session,
            from,
            to,
            SignalPayload::Description(answer),
        )
    }

    pub fn ice_candidate(
        session: SessionId,
        from: ParticipantId,
        to: ParticipantId,
        candidate: IceCandidate,
    ) -> Self {
        Self::new(
            SignalKind::IceCandidate,
            session,
            from,
            to,
            SignalPayload::Candidate(candidate),
        )
    }

    pub fn join_request(session: SessionId, from: ParticipantId, to: ParticipantId) -> Self {
        Self::new(SignalKind::JoinRequest, session, from, to, SignalPayload::Empty)
    }

    /// Session description carried by an offer or answer whose payload
    /// agrees with the message type.
    pub fn description(&self) -> Option<&SessionDescription> {
        match (&self.kind, &self.payload) {
            (SignalKind::Offer, SignalPayload::Description(d)) if d.kind == DescriptionKind::Offer => {
                Some(d)
            }
            (SignalKind::Answer, SignalPayload::Description(d))
                if d.kind == DescriptionKind::Answer =>
            {
                Some(d)
            }
            _ => None,
        }
    }

    pub fn candidate(&self) -> Option<&IceCandidate> {
        match (&self.kind, &self.payload) {
            (SignalKind::IceCandidate, SignalPayload::Candidate(c)) => Some(c),
            _ => None,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        match self.kind {
            SignalKind::Offer | SignalKind::Answer => self.description().is_some(),
            SignalKind::IceCandidate => self.candidate().is_some(),
            SignalKind::JoinRequest => true,
        }
    }
}

/// A message as handed out by the relay, together with the id it was
/// stored under.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct DeliveredSignal {
    pub id: MessageId,
    pub message: SignalingMessage,
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
