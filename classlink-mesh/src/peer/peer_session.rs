use crate::transport::{PeerTransport, RemoteTrack};
use classlink_core::{ConnectionState, IceCandidate, MediaKind, ParticipantId, SignalingState};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;

/// Media received from one remote participant, grouped by stream id.
#[derive(Debug, Clone)]
pub struct RemoteStream {
    pub id: String,
    pub tracks: Vec<RemoteTrack>,
}

impl RemoteStream {
    pub fn has_kind(&self, kind: MediaKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }
}

/// Bounded FIFO of candidates that arrived before they could be applied.
#[derive(Debug)]
pub struct CandidateQueue {
    items: VecDeque<IceCandidate>,
    limit: usize,
}

impl CandidateQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            items: VecDeque::new(),
            limit,
        }
    }

    /// Pushes `candidate`, evicting the oldest entry when full.
    pub fn push(&mut self, candidate: IceCandidate) {
        if self.items.len() >= self.limit {
            warn!(
                "Pending candidate queue full ({}), dropping oldest",
                self.limit
            );
            self.items.pop_front();
        }
        self.items.push_back(candidate);
    }

    pub fn append(&mut self, other: CandidateQueue) {
        for candidate in other.items {
            self.push(candidate);
        }
    }

    pub fn take(&mut self) -> Vec<IceCandidate> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub struct PeerSession {
    pub(crate) remote: ParticipantId,
    pub(crate) transport: Arc<dyn PeerTransport>,
    pub(crate) generation: u64,
    pub(crate) signaling_state: SignalingState,
    pub(crate) connection_state: ConnectionState,
    pub(crate) remote_description_set: bool,
    pub(crate) pending_candidates: CandidateQueue,
    pub(crate) remote_stream: Option<Arc<RemoteStream>>,
}

impl PeerSession {
    pub(crate) fn new(
        remote: ParticipantId,
        transport: Arc<dyn PeerTransport>,
        generation: u64,
        candidate_limit: usize,
    ) -> Self {
        Self {
            remote,
            transport,
            generation,
            signaling_state: SignalingState::Stable,
            connection_state: ConnectionState::New,
            remote_description_set: false,
            pending_candidates: CandidateQueue::new(candidate_limit),
            remote_stream: None,
        }
    }

    pub fn remote(&self) -> &ParticipantId {
        &self.remote
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.signaling_state
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_description_set
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn remote_stream(&self) -> Option<Arc<RemoteStream>> {
        self.remote_stream.clone()
    }
}

/// Point-in-time view of one peer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSnapshot {
    pub remote: ParticipantId,
    pub signaling_state: SignalingState,
    pub connection_state: ConnectionState,
    pub pending_candidates: usize,
    pub has_remote_stream: bool,
}

impl From<&PeerSession> for PeerSnapshot {
    fn from(session: &PeerSession) -> Self {
        Self {
            remote: session.remote.clone(),
            signaling_state: session.signaling_state,
            connection_state: session.connection_state,
            pending_candidates: session.pending_candidates.len(),
            has_remote_stream: session.remote_stream.is_some(),
        }
    }
}
