use crate::error::SignalingError;
use crate::signaling::{SignalingTransport, Subscription};
use async_trait::async_trait;
use classlink_core::{DeliveredSignal, MessageId, ParticipantId, SessionId, SignalingMessage};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::debug;

type Mailbox = (SessionId, ParticipantId);

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<DeliveredSignal>,
}

#[derive(Default)]
struct RelayInner {
    store: DashMap<MessageId, DeliveredSignal>,
    subscribers: DashMap<Mailbox, Vec<Subscriber>>,
    next_subscriber: AtomicU64,
    published: AtomicUsize,
    extra_deliveries: AtomicUsize,
    fail_next_publish: AtomicBool,
    fail_acknowledge: AtomicBool,
}

/// In-process relay with document-store semantics: messages stay stored
/// until acknowledged and a new subscription first replays what is stored
/// for it, oldest first.
#[derive(Clone, Default)]
pub struct MemoryRelay {
    inner: Arc<RelayInner>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every live message `extra` more times under the same id.
    pub fn set_extra_deliveries(&self, extra: usize) {
        self.inner.extra_deliveries.store(extra, Ordering::SeqCst);
    }

    pub fn fail_next_publish(&self) {
        self.inner.fail_next_publish.store(true, Ordering::SeqCst);
    }

    pub fn set_fail_acknowledge(&self, fail: bool) {
        self.inner.fail_acknowledge.store(fail, Ordering::SeqCst);
    }

    /// Messages published and not yet acknowledged.
    pub fn pending_count(&self) -> usize {
        self.inner.store.len()
    }

    pub fn published_count(&self) -> usize {
        self.inner.published.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self, session: &SessionId, who: &ParticipantId) -> usize {
        self.inner
            .subscribers
            .get(&(session.clone(), who.clone()))
            .map_or(0, |subs| subs.len())
    }

    /// Stored messages addressed to `who`, oldest first.
    pub fn stored_for(&self, session: &SessionId, who: &ParticipantId) -> Vec<DeliveredSignal> {
        let mut stored: Vec<DeliveredSignal> = self
            .inner
            .store
            .iter()
            .filter(|entry| entry.message.session == *session && entry.message.to == *who)
            .map(|entry| entry.value().clone())
            .collect();
        stored.sort_by_key(|d| d.message.created_at);
        stored
    }
}

impl RelayInner {
    fn remove_subscriber(&self, mailbox: &Mailbox, id: u64) {
        if let Some(mut subs) = self.subscribers.get_mut(mailbox) {
            subs.retain(|s| s.id != id);
        }
        self.subscribers.remove_if(mailbox, |_, subs| subs.is_empty());
    }
}

#[async_trait]
impl SignalingTransport for MemoryRelay {
    async fn publish(&self, message: SignalingMessage) -> Result<MessageId, SignalingError> {
        if self.inner.fail_next_publish.swap(false, Ordering::SeqCst) {
            return Err(SignalingError::Publish("relay rejected the message".into()));
        }

        let id = MessageId::new();
        let mailbox = (message.session.clone(), message.to.clone());
        let delivered = DeliveredSignal {
            id: id.clone(),
            message,
        };

        self.inner.store.insert(id.clone(), delivered.clone());
        self.inner.published.fetch_add(1, Ordering::SeqCst);

        let copies = 1 + self.inner.extra_deliveries.load(Ordering::SeqCst);
        if let Some(mut subs) = self.inner.subscribers.get_mut(&mailbox) {
            subs.retain(|s| (0..copies).all(|_| s.tx.send(delivered.clone()).is_ok()));
        }

        debug!(
            "Relay stored {} {} -> {}",
            delivered.message.kind, delivered.message.from, delivered.message.to
        );
        Ok(id)
    }

    async fn subscribe(
        &self,
        session: &SessionId,
        me: &ParticipantId,
    ) -> Result<Subscription, SignalingError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::SeqCst);
        let mailbox = (session.clone(), me.clone());

        // Registered before the replay; a message published in between may
        // arrive twice, which subscribers already tolerate.
        self.inner
            .subscribers
            .entry(mailbox.clone())
            .or_default()
            .push(Subscriber { id, tx: tx.clone() });

        for stored in self.stored_for(session, me) {
            let _ = tx.send(stored);
        }

        let inner: Weak<RelayInner> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(rx).on_unsubscribe(move || {
            if let Some(inner) = inner.upgrade() {
                inner.remove_subscriber(&mailbox, id);
            }
        }))
    }

    async fn acknowledge(&self, id: &MessageId) -> Result<(), SignalingError> {
        if self.inner.fail_acknowledge.load(Ordering::SeqCst) {
            return Err(SignalingError::Acknowledge(format!(
                "relay refused to delete {id}"
            )));
        }
        self.inner.store.remove(id);
        Ok(())
    }
}
