use classlink_core::{ConnectionState, IceCandidate, MediaKind, ParticipantId};
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::track::track_remote::TrackRemote;

/// A track received from the remote side.
#[derive(Clone)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: MediaKind,
    /// Present for real connections; absent for transports without media.
    pub source: Option<Arc<TrackRemote>>,
}

impl std::fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum TransportEventKind {
    StateChanged(ConnectionState),
    CandidateGenerated(IceCandidate),
    TrackAdded(RemoteTrack),
}

/// Events a transport raises for the peer session manager.
///
/// `generation` identifies the slot incarnation so events from a replaced
/// connection can be told apart from its successor's.
#[derive(Debug, Clone)]
pub struct TransportEvent {
    pub remote: ParticipantId,
    pub generation: u64,
    pub kind: TransportEventKind,
}

/// Handed to a transport on creation; tags everything it emits.
#[derive(Clone)]
pub struct TransportEventSink {
    remote: ParticipantId,
    generation: u64,
    tx: mpsc::Sender<TransportEvent>,
}

impl TransportEventSink {
    pub fn new(remote: ParticipantId, generation: u64, tx: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            remote,
            generation,
            tx,
        }
    }

    pub fn remote(&self) -> &ParticipantId {
        &self.remote
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn state_changed(&self, state: ConnectionState) {
        self.emit(TransportEventKind::StateChanged(state)).await;
    }

    pub async fn candidate_generated(&self, candidate: IceCandidate) {
        self.emit(TransportEventKind::CandidateGenerated(candidate))
            .await;
    }

    pub async fn track_added(&self, track: RemoteTrack) {
        self.emit(TransportEventKind::TrackAdded(track)).await;
    }

    async fn emit(&self, kind: TransportEventKind) {
        let _ = self
            .tx
            .send(TransportEvent {
                remote: self.remote.clone(),
                generation: self.generation,
                kind,
            })
            .await;
    }
}
