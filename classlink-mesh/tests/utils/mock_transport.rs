use anyhow::{Result, bail};
use async_trait::async_trait;
use classlink_core::{ConnectionState, IceCandidate, MediaKind, SessionDescription};
use classlink_mesh::LocalTrack;
use classlink_mesh::transport::{PeerTransport, RemoteTrack, TransportEventSink, TransportFactory};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Knobs {
    fail_next_create: AtomicBool,
    fail_offers: AtomicBool,
    fail_answers: AtomicBool,
    fail_remote_descriptions: AtomicBool,
    reject_candidates: AtomicBool,
    manual_connect: AtomicBool,
}

#[derive(Default)]
struct Shared {
    knobs: Knobs,
    created: Mutex<Vec<Arc<MockTransport>>>,
    next_id: AtomicUsize,
}

/// TransportFactory producing in-memory transports that "connect" as soon
/// as both descriptions are set.
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    shared: Arc<Shared>,
}

impl MockTransportFactory {
    /// Create a new factory with every knob off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create` call fail.
    pub fn fail_next_create(&self) {
        self.shared.knobs.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_offers(&self, fail: bool) {
        self.shared.knobs.fail_offers.store(fail, Ordering::SeqCst);
    }

    pub fn fail_answers(&self, fail: bool) {
        self.shared.knobs.fail_answers.store(fail, Ordering::SeqCst);
    }

    pub fn fail_remote_descriptions(&self, fail: bool) {
        self.shared
            .knobs
            .fail_remote_descriptions
            .store(fail, Ordering::SeqCst);
    }

    pub fn reject_candidates(&self, reject: bool) {
        self.shared.knobs.reject_candidates.store(reject, Ordering::SeqCst);
    }

    /// Keep transports in `New` until the test drives them.
    pub fn manual_connect(&self, manual: bool) {
        self.shared.knobs.manual_connect.store(manual, Ordering::SeqCst);
    }

    /// Every transport created so far, oldest first.
    pub fn transports(&self) -> Vec<Arc<MockTransport>> {
        lock(&self.shared.created).clone()
    }

    pub fn last(&self) -> Option<Arc<MockTransport>> {
        lock(&self.shared.created).last().cloned()
    }

    pub fn created_count(&self) -> usize {
        lock(&self.shared.created).len()
    }

    /// Transports not closed yet.
    pub fn live_count(&self) -> usize {
        lock(&self.shared.created)
            .iter()
            .filter(|t| !t.is_closed())
            .count()
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(&self, sink: TransportEventSink) -> Result<Arc<dyn PeerTransport>> {
        if self
            .shared
            .knobs
            .fail_next_create
            .swap(false, Ordering::SeqCst)
        {
            bail!("mock transport creation failed");
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let transport = Arc::new(MockTransport {
            id,
            sink,
            shared: self.shared.clone(),
            state: Mutex::new(MockState::default()),
        });
        lock(&self.shared.created).push(transport.clone());
        Ok(transport)
    }
}

#[derive(Default)]
struct MockState {
    tracks: Vec<String>,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    remote_set_count: usize,
    applied: Vec<IceCandidate>,
    detached: bool,
    connected: bool,
    closed: bool,
}

pub struct MockTransport {
    id: usize,
    sink: TransportEventSink,
    shared: Arc<Shared>,
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn generation(&self) -> u64 {
        self.sink.generation()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub fn is_detached(&self) -> bool {
        lock(&self.state).detached
    }

    pub fn track_count(&self) -> usize {
        lock(&self.state).tracks.len()
    }

    pub fn remote_set_count(&self) -> usize {
        lock(&self.state).remote_set_count
    }

    /// Candidate strings applied so far, in order.
    pub fn applied_candidates(&self) -> Vec<String> {
        lock(&self.state)
            .applied
            .iter()
            .map(|c| c.candidate.clone())
            .collect()
    }

    /// Push a connection state change as the real transport would.
    pub async fn emit_state(&self, state: ConnectionState) {
        self.sink.state_changed(state).await;
    }

    async fn maybe_connect(&self) {
        let remote_tracks = {
            let mut state = lock(&self.state);
            if state.connected
                || state.closed
                || state.local.is_none()
                || state.remote.is_none()
                || self.shared.knobs.manual_connect.load(Ordering::SeqCst)
            {
                return;
            }
            state.connected = true;
            state
                .remote
                .as_ref()
                .map(|d| advertised_tracks(&d.sdp))
                .unwrap_or_default()
        };

        self.sink.state_changed(ConnectionState::Connecting).await;
        self.sink.state_changed(ConnectionState::Connected).await;
        for i in 0..remote_tracks {
            let kind = if i == 0 {
                MediaKind::Audio
            } else {
                MediaKind::Video
            };
            self.sink
                .track_added(RemoteTrack {
                    id: format!("remote-{}-{}", self.id, i),
                    stream_id: format!("remote-stream-{}", self.id),
                    kind,
                    source: None,
                })
                .await;
        }
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn add_track(&self, track: Arc<LocalTrack>) -> Result<()> {
        lock(&self.state).tracks.push(track.id().to_string());
        Ok(())
    }

    async fn detach_tracks(&self) -> Result<()> {
        lock(&self.state).detached = true;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        if self.shared.knobs.fail_offers.load(Ordering::SeqCst) {
            bail!("mock offer failure");
        }
        let tracks = self.track_count();
        Ok(SessionDescription::offer(format!(
            "mock-offer {} tracks={}",
            self.id, tracks
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        if self.shared.knobs.fail_answers.load(Ordering::SeqCst) {
            bail!("mock answer failure");
        }
        let tracks = self.track_count();
        Ok(SessionDescription::answer(format!(
            "mock-answer {} tracks={}",
            self.id, tracks
        )))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        lock(&self.state).local = Some(description);
        self.sink
            .candidate_generated(IceCandidate {
                candidate: format!(
                    "candidate:{} 1 udp 2130706431 127.0.0.1 {} typ host",
                    self.id,
                    50000 + self.id
                ),
                sdp_mid: Some("0".to_string()),
                sdp_m_line_index: Some(0),
            })
            .await;
        self.maybe_connect().await;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        if self
            .shared
            .knobs
            .fail_remote_descriptions
            .load(Ordering::SeqCst)
        {
            bail!("mock remote description rejected");
        }
        {
            let mut state = lock(&self.state);
            state.remote = Some(description);
            state.remote_set_count += 1;
        }
        self.maybe_connect().await;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        if self.shared.knobs.reject_candidates.load(Ordering::SeqCst) {
            bail!("mock candidate rejected");
        }
        let mut state = lock(&self.state);
        if state.remote.is_none() {
            bail!("remote description not set");
        }
        state.applied.push(candidate);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        {
            let mut state = lock(&self.state);
            if state.closed {
                return Ok(());
            }
            state.closed = true;
        }
        self.sink.state_changed(ConnectionState::Closed).await;
        Ok(())
    }
}

fn advertised_tracks(sdp: &str) -> usize {
    sdp.split("tracks=")
        .nth(1)
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or_default()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
