use classlink_core::{DeliveredSignal, MessageId, ParticipantId, SignalKind, SignalingMessage};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    kind: SignalKind,
    sender: ParticipantId,
    /// Candidate string or SDP. Only an identical payload is a duplicate,
    /// so a fresh negotiation inside the window still gets through. Join
    /// requests carry nothing and are keyed on type and sender alone.
    discriminator: Option<String>,
}

impl WindowKey {
    fn of(message: &SignalingMessage) -> Self {
        let discriminator = match message.candidate() {
            Some(candidate) => Some(candidate.candidate.clone()),
            None => message.description().map(|d| d.sdp.clone()),
        };
        Self {
            kind: message.kind,
            sender: message.from.clone(),
            discriminator,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplicate {
    /// This exact message id was already admitted.
    SameId,
    /// Same kind from the same sender inside the suppression window.
    WithinWindow,
}

/// Two-layer duplicate filter: a set of admitted message ids and a
/// `(kind, sender, payload)` suppression window for logical duplicates that the
/// relay delivered under fresh ids.
#[derive(Debug)]
pub struct Deduplicator {
    processed: HashSet<MessageId>,
    recent: HashMap<WindowKey, Instant>,
    window: Duration,
}

impl Deduplicator {
    pub fn new(window: Duration) -> Self {
        Self {
            processed: HashSet::new(),
            recent: HashMap::new(),
            window,
        }
    }

    /// Records `signal` as seen. Suppressed messages are recorded too, so a
    /// redelivery of one is reported as [`Duplicate::SameId`].
    pub fn admit(&mut self, signal: &DeliveredSignal) -> Result<(), Duplicate> {
        if self.processed.contains(&signal.id) {
            return Err(Duplicate::SameId);
        }
        self.processed.insert(signal.id.clone());

        let now = Instant::now();
        self.prune(now);

        let key = WindowKey::of(&signal.message);
        if self.recent.contains_key(&key) {
            return Err(Duplicate::WithinWindow);
        }
        self.recent.insert(key, now);
        Ok(())
    }

    /// Forgets a message that could not be acted on, so neither a
    /// redelivery of it nor a retry from the sender is dropped.
    pub fn release(&mut self, id: &MessageId, message: &SignalingMessage) {
        self.processed.remove(id);
        self.recent.remove(&WindowKey::of(message));
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.recent
            .retain(|_, seen| now.saturating_duration_since(*seen) < window);
    }
}
