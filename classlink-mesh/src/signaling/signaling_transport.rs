use crate::error::SignalingError;
use async_trait::async_trait;
use classlink_core::{DeliveredSignal, MessageId, ParticipantId, SessionId, SignalingMessage};
use tokio::sync::mpsc;

/// The relay carrying offers, answers, candidates and join requests.
///
/// Nothing about ordering or exactly-once delivery is assumed: subscribers
/// may see duplicates, reordering, or nothing at all.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn publish(&self, message: SignalingMessage) -> Result<MessageId, SignalingError>;

    /// Messages addressed to `me` within `session`, until the returned
    /// subscription is dropped.
    async fn subscribe(
        &self,
        session: &SessionId,
        me: &ParticipantId,
    ) -> Result<Subscription, SignalingError>;

    /// Asks the relay to delete a processed message.
    async fn acknowledge(&self, id: &MessageId) -> Result<(), SignalingError>;
}

type Unsubscribe = Box<dyn FnOnce() + Send>;

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<DeliveredSignal>,
    unsubscribe: Option<Unsubscribe>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<DeliveredSignal>) -> Self {
        Self {
            rx,
            unsubscribe: None,
        }
    }

    pub fn on_unsubscribe<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.unsubscribe = Some(Box::new(f));
        self
    }

    pub async fn recv(&mut self) -> Option<DeliveredSignal> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}
