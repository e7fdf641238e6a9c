pub mod test_acknowledgement;
pub mod test_duplicate_suppression;

use classlink_core::{DeliveredSignal, ParticipantId, Role, SessionId, SignalingMessage};
use classlink_mesh::signaling::SignalRouter;
use classlink_mesh::{MemoryRelay, SignalingTransport};
use std::sync::Arc;
use std::time::Duration;

pub const WINDOW: Duration = Duration::from_millis(2500);

/// A router for `me` on a shared relay, plus a peer to send from.
pub struct Desk {
    pub relay: MemoryRelay,
    pub session: SessionId,
    pub me: ParticipantId,
    pub peer: ParticipantId,
    pub router: SignalRouter,
}

impl Desk {
    pub fn new(role: Role) -> Self {
        let relay = MemoryRelay::new();
        let session = SessionId::new();
        let me = ParticipantId::new();
        let router = SignalRouter::new(
            session.clone(),
            me.clone(),
            role,
            Arc::new(relay.clone()),
            WINDOW,
        );

        Self {
            relay,
            session,
            me,
            peer: ParticipantId::new(),
            router,
        }
    }

    /// Publishes `message` and returns it as the relay stored it.
    pub async fn deliver(&self, message: SignalingMessage) -> DeliveredSignal {
        let id = self.relay.publish(message.clone()).await.unwrap();
        DeliveredSignal { id, message }
    }

    pub fn join_request(&self) -> SignalingMessage {
        SignalingMessage::join_request(self.session.clone(), self.peer.clone(), self.me.clone())
    }
}
