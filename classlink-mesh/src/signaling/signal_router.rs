use crate::error::DispatchError;
use crate::signaling::{Deduplicator, Duplicate, SignalingTransport};
use async_trait::async_trait;
use classlink_core::{
    DeliveredSignal, IceCandidate, MessageId, ParticipantId, Role, SessionDescription, SessionId,
    SignalKind, SignalPayload,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Receives messages the router has admitted.
#[async_trait]
pub trait SignalHandler: Send {
    async fn on_offer(
        &mut self,
        from: &ParticipantId,
        offer: SessionDescription,
    ) -> Result<(), DispatchError>;

    async fn on_answer(
        &mut self,
        from: &ParticipantId,
        answer: SessionDescription,
    ) -> Result<(), DispatchError>;

    async fn on_candidate(
        &mut self,
        from: &ParticipantId,
        candidate: IceCandidate,
    ) -> Result<(), DispatchError>;

    async fn on_join_request(&mut self, from: &ParticipantId) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    OwnMessage,
    Misaddressed,
    Malformed,
    WrongRole,
    AlreadyProcessed,
    Suppressed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched(SignalKind),
    Dropped(DropReason),
    Failed(DispatchError),
}

/// Which role acts on a given message kind.
pub fn accepts(role: Role, kind: SignalKind) -> bool {
    match kind {
        SignalKind::Offer => role == Role::Viewer,
        SignalKind::Answer | SignalKind::JoinRequest => role == Role::Presenter,
        SignalKind::IceCandidate => true,
    }
}

pub struct SignalRouter {
    me: ParticipantId,
    role: Role,
    session: SessionId,
    dedup: Deduplicator,
    signaling: Arc<dyn SignalingTransport>,
}

impl SignalRouter {
    pub fn new(
        session: SessionId,
        me: ParticipantId,
        role: Role,
        signaling: Arc<dyn SignalingTransport>,
        suppression_window: Duration,
    ) -> Self {
        Self {
            me,
            role,
            session,
            dedup: Deduplicator::new(suppression_window),
            signaling,
        }
    }

    pub async fn route<H>(&mut self, signal: DeliveredSignal, handler: &mut H) -> RouteOutcome
    where
        H: SignalHandler + ?Sized,
    {
        if let Err(reason) = self.screen(&signal) {
            debug!(
                "Dropping {} {} from {}: {:?}",
                signal.message.kind, signal.id, signal.message.from, reason
            );
            if reason == DropReason::Suppressed {
                self.acknowledge(&signal.id).await;
            }
            return RouteOutcome::Dropped(reason);
        }

        let DeliveredSignal { id, message } = signal;
        let kind = message.kind;
        let from = message.from.clone();
        debug!("Dispatching {} from {}", kind, from);

        let result = match (kind, message.payload.clone()) {
            (SignalKind::Offer, SignalPayload::Description(offer)) => {
                handler.on_offer(&from, offer).await
            }
            (SignalKind::Answer, SignalPayload::Description(answer)) => {
                handler.on_answer(&from, answer).await
            }
            (SignalKind::IceCandidate, SignalPayload::Candidate(candidate)) => {
                handler.on_candidate(&from, candidate).await
            }
            (SignalKind::JoinRequest, _) => handler.on_join_request(&from).await,
            _ => return RouteOutcome::Dropped(DropReason::Malformed),
        };

        match result {
            Ok(()) => {
                self.acknowledge(&id).await;
                RouteOutcome::Dispatched(kind)
            }
            Err(e) => {
                warn!("Handling {} from {} failed: {}", kind, from, e);
                self.dedup.release(&id, &message);
                RouteOutcome::Failed(e)
            }
        }
    }

    fn screen(&mut self, signal: &DeliveredSignal) -> Result<(), DropReason> {
        let message = &signal.message;

        if message.from == self.me {
            return Err(DropReason::OwnMessage);
        }
        if message.to != self.me || message.session != self.session {
            return Err(DropReason::Misaddressed);
        }
        if !message.is_well_formed() {
            return Err(DropReason::Malformed);
        }
        if !accepts(self.role, message.kind) {
            return Err(DropReason::WrongRole);
        }

        self.dedup.admit(signal).map_err(|duplicate| match duplicate {
            Duplicate::SameId => DropReason::AlreadyProcessed,
            Duplicate::WithinWindow => DropReason::Suppressed,
        })
    }

    async fn acknowledge(&self, id: &MessageId) {
        match self.signaling.acknowledge(id).await {
            Ok(()) => debug!("Acknowledged {}", id),
            Err(e) => warn!("Could not acknowledge {}: {}", id, e),
        }
    }
}
