use crate::error::{CaptureError, NegotiationError, SignalingError};
use crate::peer::{PeerSnapshot, RemoteStream};
use crate::screen_share::ScreenShareEvent;
use classlink_core::{ParticipantId, Role, SessionId};
use std::sync::Arc;

/// What a session reports to its owner.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    LocalMediaReady { audio: bool, video: bool },
    /// Every capture fallback failed; the session continues receive-only.
    LocalMediaUnavailable { error: CaptureError },
    LocalMediaEnded,
    JoinRequested,
    OfferSent { remote: ParticipantId },
    PeerConnected { remote: ParticipantId },
    PeerDisconnected { remote: ParticipantId },
    RemoteStreamAdded { remote: ParticipantId, stream: Arc<RemoteStream> },
    RemoteStreamRemoved { remote: ParticipantId },
    ReconnectScheduled { remote: ParticipantId, attempt: u32 },
    NegotiationFailed { error: NegotiationError },
    PublishFailed { error: SignalingError },
    ScreenShare(ScreenShareEvent),
    Left,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session: SessionId,
    pub me: ParticipantId,
    pub role: Role,
    pub peers: Vec<PeerSnapshot>,
    /// `None` when there is no local track of that kind.
    pub audio_enabled: Option<bool>,
    pub video_enabled: Option<bool>,
    pub screen_share: Option<u64>,
}

impl SessionSnapshot {
    pub fn peer(&self, remote: &ParticipantId) -> Option<&PeerSnapshot> {
        self.peers.iter().find(|p| p.remote == *remote)
    }
}
