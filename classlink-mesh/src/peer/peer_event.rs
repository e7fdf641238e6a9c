use crate::peer::RemoteStream;
use classlink_core::{IceCandidate, ParticipantId};
use std::sync::Arc;

/// Notifications the peer session manager pushes onto its outbound queue.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    RemoteStreamAdded {
        remote: ParticipantId,
        stream: Arc<RemoteStream>,
    },
    RemoteStreamRemoved {
        remote: ParticipantId,
    },
    PeerConnected {
        remote: ParticipantId,
    },
    PeerDisconnected {
        remote: ParticipantId,
    },
    /// Needs relaying to `remote` through signaling.
    LocalCandidateGenerated {
        remote: ParticipantId,
        candidate: IceCandidate,
    },
}
