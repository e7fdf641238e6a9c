use crate::capture::LocalTrack;
use crate::config::MeshConfig;
use crate::error::NegotiationError;
use crate::peer::{CandidateQueue, PeerEvent, PeerSession, PeerSnapshot, RemoteStream};
use crate::transport::{
    PeerTransport, TransportEvent, TransportEventKind, TransportEventSink, TransportFactory,
};
use classlink_core::{
    ConnectionState, DescriptionKind, IceCandidate, ParticipantId, SessionDescription,
    SignalingState,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome of applying a remote answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// Wrong signaling state or no session; the answer is a duplicate or stale.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDisposition {
    Queued,
    Applied,
    Rejected,
}

#[derive(Debug, Clone, Copy)]
pub struct PeerConfig {
    pub replace_grace: Duration,
    pub max_pending_candidates: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self::from(&MeshConfig::default())
    }
}

impl From<&MeshConfig> for PeerConfig {
    fn from(config: &MeshConfig) -> Self {
        Self {
            replace_grace: config.replace_grace(),
            max_pending_candidates: config.max_pending_candidates,
        }
    }
}

/// Sole owner of every `PeerSession`, keyed by remote participant.
///
/// All mutation goes through `&mut self`, so the orchestrator loop that owns
/// the manager is the only writer. A slot is never reused in place: recreating
/// a session closes the old transport and installs a new one under a fresh
/// generation, and transport events from older generations are discarded.
pub struct PeerSessionManager {
    sessions: HashMap<ParticipantId, PeerSession>,
    early_candidates: HashMap<ParticipantId, CandidateQueue>,
    local_tracks: Vec<Arc<LocalTrack>>,
    factory: Arc<dyn TransportFactory>,
    transport_tx: mpsc::Sender<TransportEvent>,
    events: mpsc::UnboundedSender<PeerEvent>,
    next_generation: u64,
    config: PeerConfig,
}

impl PeerSessionManager {
    /// The returned receiver carries raw transport callbacks; feed each one
    /// back through [`PeerSessionManager::handle_transport_event`].
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        config: PeerConfig,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (transport_tx, transport_rx) = mpsc::channel(256);

        let manager = Self {
            sessions: HashMap::new(),
            early_candidates: HashMap::new(),
            local_tracks: Vec::new(),
            factory,
            transport_tx,
            events,
            next_generation: 0,
            config,
        };
        (manager, transport_rx)
    }

    /// Tracks attached to every session created from now on.
    pub fn set_local_tracks(&mut self, tracks: Vec<Arc<LocalTrack>>) {
        self.local_tracks = tracks;
    }

    /// Forgets the local tracks and stops sending them on every live session.
    pub async fn release_local_tracks(&mut self) {
        self.local_tracks.clear();

        let transports: Vec<(ParticipantId, Arc<dyn PeerTransport>)> = self
            .sessions
            .values()
            .map(|s| (s.remote.clone(), s.transport.clone()))
            .collect();

        for (remote, transport) in transports {
            if let Err(e) = transport.detach_tracks().await {
                warn!("Failed to detach local tracks for {:?}: {:#}", remote, e);
            }
        }
    }

    pub async fn create_offer(
        &mut self,
        remote: &ParticipantId,
    ) -> Result<SessionDescription, NegotiationError> {
        info!("Creating offer for {:?}", remote);

        if self.dispose(remote).await {
            tokio::time::sleep(self.config.replace_grace).await;
        }
        if let Some(stale) = self.early_candidates.remove(remote) {
            debug!(
                "Discarding {} candidates buffered for {:?} before offering",
                stale.len(),
                remote
            );
        }

        let transport = self.open_session(remote).await?;

        let offer = match transport.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                self.discard(remote).await;
                return Err(NegotiationError::OfferCreationFailed {
                    remote: remote.clone(),
                    reason: format!("{e:#}"),
                });
            }
        };
        if let Err(e) = transport.set_local_description(offer.clone()).await {
            self.discard(remote).await;
            return Err(NegotiationError::OfferCreationFailed {
                remote: remote.clone(),
                reason: format!("{e:#}"),
            });
        }

        if let Some(session) = self.sessions.get_mut(remote) {
            session.signaling_state = SignalingState::HaveLocalOffer;
        }
        Ok(offer)
    }

    pub async fn accept_offer(
        &mut self,
        remote: &ParticipantId,
        offer: SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        info!("Accepting offer from {:?}", remote);

        if offer.kind != DescriptionKind::Offer {
            return Err(NegotiationError::RemoteDescriptionRejected {
                remote: remote.clone(),
                reason: format!("expected an offer, got {:?}", offer.kind),
            });
        }

        let limit = self.config.max_pending_candidates;
        let mut carried = self
            .early_candidates
            .remove(remote)
            .unwrap_or_else(|| CandidateQueue::new(limit));

        if let Some(mut previous) = self.sessions.remove(remote) {
            if !previous.remote_description_set {
                carried.append(std::mem::replace(
                    &mut previous.pending_candidates,
                    CandidateQueue::new(limit),
                ));
            }
            self.close_session(previous).await;
            tokio::time::sleep(self.config.replace_grace).await;
        }

        let transport = self.open_session(remote).await?;
        if let Some(session) = self.sessions.get_mut(remote) {
            session.pending_candidates = carried;
        }

        if let Err(e) = transport.set_remote_description(offer).await {
            self.discard(remote).await;
            return Err(NegotiationError::RemoteDescriptionRejected {
                remote: remote.clone(),
                reason: format!("{e:#}"),
            });
        }
        if let Some(session) = self.sessions.get_mut(remote) {
            session.signaling_state = SignalingState::HaveRemoteOffer;
            session.remote_description_set = true;
        }
        self.drain_pending(remote).await;

        let answer = match transport.create_answer().await {
            Ok(answer) => answer,
            Err(e) => {
                self.discard(remote).await;
                return Err(NegotiationError::AnswerCreationFailed {
                    remote: remote.clone(),
                    reason: format!("{e:#}"),
                });
            }
        };
        if let Err(e) = transport.set_local_description(answer.clone()).await {
            self.discard(remote).await;
            return Err(NegotiationError::AnswerCreationFailed {
                remote: remote.clone(),
                reason: format!("{e:#}"),
            });
        }

        if let Some(session) = self.sessions.get_mut(remote) {
            session.signaling_state = SignalingState::Stable;
        }
        Ok(answer)
    }

    pub async fn accept_answer(
        &mut self,
        remote: &ParticipantId,
        answer: SessionDescription,
    ) -> Result<Transition, NegotiationError> {
        let Some(session) = self.sessions.get(remote) else {
            debug!("Ignoring answer from {:?}: no session", remote);
            return Ok(Transition::Ignored);
        };
        if session.signaling_state != SignalingState::HaveLocalOffer {
            info!(
                "Ignoring answer from {:?} in state {:?}",
                remote, session.signaling_state
            );
            return Ok(Transition::Ignored);
        }
        if answer.kind != DescriptionKind::Answer {
            return Err(NegotiationError::RemoteDescriptionRejected {
                remote: remote.clone(),
                reason: format!("expected an answer, got {:?}", answer.kind),
            });
        }

        let transport = session.transport.clone();
        let generation = session.generation;

        if let Err(e) = transport.set_remote_description(answer).await {
            self.discard(remote).await;
            return Err(NegotiationError::RemoteDescriptionRejected {
                remote: remote.clone(),
                reason: format!("{e:#}"),
            });
        }

        let Some(session) = self
            .sessions
            .get_mut(remote)
            .filter(|s| s.generation == generation)
        else {
            return Ok(Transition::Ignored);
        };
        session.signaling_state = SignalingState::Stable;
        session.remote_description_set = true;
        info!("Answer from {:?} applied", remote);

        self.drain_pending(remote).await;
        Ok(Transition::Applied)
    }

    pub async fn add_remote_candidate(
        &mut self,
        remote: &ParticipantId,
        candidate: IceCandidate,
    ) -> CandidateDisposition {
        let limit = self.config.max_pending_candidates;

        let transport = match self.sessions.get_mut(remote) {
            None => {
                debug!("Buffering candidate from {:?}: no session yet", remote);
                self.early_candidates
                    .entry(remote.clone())
                    .or_insert_with(|| CandidateQueue::new(limit))
                    .push(candidate);
                return CandidateDisposition::Queued;
            }
            Some(session) if !session.remote_description_set => {
                debug!(
                    "Buffering candidate from {:?}: no remote description",
                    remote
                );
                session.pending_candidates.push(candidate);
                return CandidateDisposition::Queued;
            }
            Some(session) => session.transport.clone(),
        };

        match transport.add_ice_candidate(candidate).await {
            Ok(()) => CandidateDisposition::Applied,
            Err(e) => {
                warn!("Candidate from {:?} rejected: {:#}", remote, e);
                CandidateDisposition::Rejected
            }
        }
    }

    pub async fn close(&mut self, remote: &ParticipantId) {
        self.early_candidates.remove(remote);

        let Some(session) = self.sessions.remove(remote) else {
            return;
        };
        self.close_session(session).await;
    }

    pub async fn close_all(&mut self) {
        self.early_candidates.clear();

        let sessions: Vec<PeerSession> = self.sessions.drain().map(|(_, s)| s).collect();
        if sessions.is_empty() {
            return;
        }
        info!("Closing {} peer sessions", sessions.len());

        let results = join_all(sessions.iter().map(|s| s.transport.close())).await;
        for (session, result) in sessions.into_iter().zip(results) {
            if let Err(e) = result {
                warn!("Failed to close transport for {:?}: {:#}", session.remote, e);
            }
            self.finish_close(session);
        }
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let Some(session) = self.sessions.get_mut(&event.remote) else {
            debug!("Dropping transport event for unknown peer {:?}", event.remote);
            return;
        };
        if session.generation != event.generation {
            debug!(
                "Dropping stale transport event for {:?} (generation {} != {})",
                event.remote, event.generation, session.generation
            );
            return;
        }

        let remote = event.remote;
        match event.kind {
            TransportEventKind::StateChanged(state) => {
                let previous = session.connection_state;
                if previous == state {
                    return;
                }
                session.connection_state = state;

                if state == ConnectionState::Connected {
                    info!("Peer {:?} connected", remote);
                    self.emit(PeerEvent::PeerConnected { remote });
                } else if state.is_down() && previous != ConnectionState::New && !previous.is_down() {
                    info!("Peer {:?} went {:?}", remote, state);
                    self.emit(PeerEvent::PeerDisconnected { remote });
                }
            }

            TransportEventKind::CandidateGenerated(candidate) => {
                self.emit(PeerEvent::LocalCandidateGenerated { remote, candidate });
            }

            TransportEventKind::TrackAdded(track) => {
                let stream = match session.remote_stream.as_deref() {
                    Some(existing) if existing.id == track.stream_id => {
                        let mut tracks: Vec<_> = existing
                            .tracks
                            .iter()
                            .filter(|t| t.id != track.id)
                            .cloned()
                            .collect();
                        tracks.push(track);
                        RemoteStream {
                            id: existing.id.clone(),
                            tracks,
                        }
                    }
                    _ => RemoteStream {
                        id: track.stream_id.clone(),
                        tracks: vec![track],
                    },
                };
                let stream = Arc::new(stream);
                session.remote_stream = Some(stream.clone());
                self.emit(PeerEvent::RemoteStreamAdded { remote, stream });
            }
        }
    }

    pub fn contains(&self, remote: &ParticipantId) -> bool {
        self.sessions.contains_key(remote)
    }

    /// True only for a session whose transport reports `Connected`.
    pub fn has_connection(&self, remote: &ParticipantId) -> bool {
        self.connection_state(remote) == Some(ConnectionState::Connected)
    }

    pub fn signaling_state(&self, remote: &ParticipantId) -> Option<SignalingState> {
        self.sessions.get(remote).map(|s| s.signaling_state)
    }

    pub fn connection_state(&self, remote: &ParticipantId) -> Option<ConnectionState> {
        self.sessions.get(remote).map(|s| s.connection_state)
    }

    /// Candidates waiting for `remote`, whether or not a session exists yet.
    pub fn pending_candidates(&self, remote: &ParticipantId) -> usize {
        match self.sessions.get(remote) {
            Some(session) => session.pending_candidates.len(),
            None => self.early_candidates.get(remote).map_or(0, |q| q.len()),
        }
    }

    pub fn remote_stream(&self, remote: &ParticipantId) -> Option<Arc<RemoteStream>> {
        self.sessions.get(remote).and_then(|s| s.remote_stream())
    }

    pub fn remotes(&self) -> Vec<ParticipantId> {
        let mut remotes: Vec<_> = self.sessions.keys().cloned().collect();
        remotes.sort();
        remotes
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn snapshot(&self) -> Vec<PeerSnapshot> {
        let mut peers: Vec<PeerSnapshot> = self.sessions.values().map(PeerSnapshot::from).collect();
        peers.sort_by(|a, b| a.remote.cmp(&b.remote));
        peers
    }

    async fn open_session(
        &mut self,
        remote: &ParticipantId,
    ) -> Result<Arc<dyn PeerTransport>, NegotiationError> {
        self.next_generation += 1;
        let generation = self.next_generation;

        let sink = TransportEventSink::new(remote.clone(), generation, self.transport_tx.clone());
        let transport = self.factory.create(sink).await.map_err(|e| {
            NegotiationError::TransportUnavailable {
                remote: remote.clone(),
                reason: format!("{e:#}"),
            }
        })?;

        for track in self.local_tracks.iter().filter(|t| !t.is_ended()) {
            if let Err(e) = transport.add_track(track.clone()).await {
                let _ = transport.close().await;
                return Err(NegotiationError::TransportUnavailable {
                    remote: remote.clone(),
                    reason: format!("{e:#}"),
                });
            }
        }

        debug!(
            "Opened peer session for {:?} (generation {})",
            remote, generation
        );
        self.sessions.insert(
            remote.clone(),
            PeerSession::new(
                remote.clone(),
                transport.clone(),
                generation,
                self.config.max_pending_candidates,
            ),
        );
        Ok(transport)
    }

    /// Closes an existing session ahead of replacement. Returns whether one existed.
    async fn dispose(&mut self, remote: &ParticipantId) -> bool {
        match self.sessions.remove(remote) {
            Some(session) => {
                self.close_session(session).await;
                true
            }
            None => false,
        }
    }

    /// Drops a half-built session after a failed negotiation step.
    async fn discard(&mut self, remote: &ParticipantId) {
        if let Some(session) = self.sessions.remove(remote) {
            warn!("Discarding peer session for {:?}", remote);
            self.close_session(session).await;
        }
    }

    async fn close_session(&mut self, session: PeerSession) {
        if let Err(e) = session.transport.close().await {
            warn!("Failed to close transport for {:?}: {:#}", session.remote, e);
        }
        self.finish_close(session);
    }

    fn finish_close(&mut self, mut session: PeerSession) {
        let was_connected = session.connection_state == ConnectionState::Connected;
        session.signaling_state = SignalingState::Closed;
        session.connection_state = ConnectionState::Closed;
        session.pending_candidates.take();

        let remote = session.remote.clone();
        if session.remote_stream.take().is_some() {
            self.emit(PeerEvent::RemoteStreamRemoved {
                remote: remote.clone(),
            });
        }
        if was_connected {
            self.emit(PeerEvent::PeerDisconnected {
                remote: remote.clone(),
            });
        }
        info!("Closed peer session for {:?}", remote);
    }

    async fn drain_pending(&mut self, remote: &ParticipantId) {
        let Some(session) = self.sessions.get_mut(remote) else {
            return;
        };
        let candidates = session.pending_candidates.take();
        if candidates.is_empty() {
            return;
        }
        let transport = session.transport.clone();

        debug!(
            "Applying {} buffered candidates for {:?}",
            candidates.len(),
            remote
        );
        for candidate in candidates {
            if let Err(e) = transport.add_ice_candidate(candidate).await {
                warn!("Buffered candidate for {:?} rejected: {:#}", remote, e);
            }
        }
    }

    fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }
}
