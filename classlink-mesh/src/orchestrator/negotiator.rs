use crate::error::{DispatchError, SignalingError};
use crate::orchestrator::{SessionContext, SessionEvent};
use crate::peer::{PeerSessionManager, Transition};
use crate::signaling::{SignalHandler, SignalingTransport};
use async_trait::async_trait;
use classlink_core::{IceCandidate, ParticipantId, SessionDescription, SignalingMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Acts on admitted signaling messages for the duration of one dispatch.
pub struct Negotiator<'a> {
    pub ctx: &'a SessionContext,
    pub manager: &'a mut PeerSessionManager,
    pub signaling: &'a Arc<dyn SignalingTransport>,
    pub events: &'a mpsc::UnboundedSender<SessionEvent>,
}

impl Negotiator<'_> {
    /// Presenter side of a join request: offer unless a healthy connection
    /// already exists.
    pub async fn initiate_connection(&mut self, remote: &ParticipantId) -> Result<(), DispatchError> {
        if self.manager.has_connection(remote) {
            info!("{} is already connected, not offering again", remote);
            return Ok(());
        }

        let offer = self.manager.create_offer(remote).await?;
        self.publish(SignalingMessage::offer(
            self.ctx.session.clone(),
            self.ctx.me.clone(),
            remote.clone(),
            offer,
        ))
        .await?;

        let _ = self.events.send(SessionEvent::OfferSent {
            remote: remote.clone(),
        });
        Ok(())
    }

    async fn publish(&self, message: SignalingMessage) -> Result<(), SignalingError> {
        let kind = message.kind;
        let id = self.signaling.publish(message).await?;
        debug!("Published {} as {}", kind, id);
        Ok(())
    }
}

#[async_trait]
impl SignalHandler for Negotiator<'_> {
    async fn on_offer(
        &mut self,
        from: &ParticipantId,
        offer: SessionDescription,
    ) -> Result<(), DispatchError> {
        if *from != self.ctx.presenter {
            info!("Ignoring offer from {}: not the presenter", from);
            return Ok(());
        }

        let answer = self.manager.accept_offer(from, offer).await?;
        self.publish(SignalingMessage::answer(
            self.ctx.session.clone(),
            self.ctx.me.clone(),
            from.clone(),
            answer,
        ))
        .await?;
        Ok(())
    }

    async fn on_answer(
        &mut self,
        from: &ParticipantId,
        answer: SessionDescription,
    ) -> Result<(), DispatchError> {
        match self.manager.accept_answer(from, answer).await? {
            Transition::Applied => debug!("Negotiation with {} complete", from),
            Transition::Ignored => debug!("Answer from {} had nothing to apply to", from),
        }
        Ok(())
    }

    async fn on_candidate(
        &mut self,
        from: &ParticipantId,
        candidate: IceCandidate,
    ) -> Result<(), DispatchError> {
        if !self.ctx.is_presenter() && *from != self.ctx.presenter {
            info!("Ignoring candidate from {}: not the presenter", from);
            return Ok(());
        }

        let disposition = self.manager.add_remote_candidate(from, candidate).await;
        debug!("Candidate from {}: {:?}", from, disposition);
        Ok(())
    }

    async fn on_join_request(&mut self, from: &ParticipantId) -> Result<(), DispatchError> {
        self.initiate_connection(from).await
    }
}
