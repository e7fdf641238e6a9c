use async_trait::async_trait;
use classlink_core::{IceCandidate, ParticipantId, SessionDescription, SignalKind};
use classlink_mesh::DispatchError;
use classlink_mesh::signaling::SignalHandler;

/// SignalHandler that records what it was asked to do.
#[derive(Default)]
pub struct RecordingHandler {
    pub calls: Vec<(SignalKind, ParticipantId)>,
    /// Returned from every call while set.
    pub fail_with: Option<DispatchError>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: SignalKind) -> usize {
        self.calls.iter().filter(|(k, _)| *k == kind).count()
    }

    fn record(&mut self, kind: SignalKind, from: &ParticipantId) -> Result<(), DispatchError> {
        self.calls.push((kind, from.clone()));
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SignalHandler for RecordingHandler {
    async fn on_offer(
        &mut self,
        from: &ParticipantId,
        _offer: SessionDescription,
    ) -> Result<(), DispatchError> {
        self.record(SignalKind::Offer, from)
    }

    async fn on_answer(
        &mut self,
        from: &ParticipantId,
        _answer: SessionDescription,
    ) -> Result<(), DispatchError> {
        self.record(SignalKind::Answer, from)
    }

    async fn on_candidate(
        &mut self,
        from: &ParticipantId,
        _candidate: IceCandidate,
    ) -> Result<(), DispatchError> {
        self.record(SignalKind::IceCandidate, from)
    }

    async fn on_join_request(&mut self, from: &ParticipantId) -> Result<(), DispatchError> {
        self.record(SignalKind::JoinRequest, from)
    }
}
