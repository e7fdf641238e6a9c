use crate::capture::{CaptureDevice, LocalTrack, TrackSignal};
use crate::error::CaptureError;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenShareEvent {
    Started { share_id: u64 },
    Muted { share_id: u64 },
    Unmuted { share_id: u64 },
    /// The capture was revoked outside of [`ScreenShareController::stop`].
    Ended { share_id: u64 },
    Stopped { share_id: u64 },
}

/// The display capture currently being shared.
#[derive(Debug, Clone)]
pub struct ScreenShareSession {
    pub id: u64,
    pub tracks: Vec<Arc<LocalTrack>>,
}

struct ActiveShare {
    id: u64,
    tracks: Vec<Arc<LocalTrack>>,
    listener: JoinHandle<()>,
}

type SharedSlot = Arc<Mutex<Option<ActiveShare>>>;

fn lock(slot: &SharedSlot) -> MutexGuard<'_, Option<ActiveShare>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns at most one display capture at a time.
pub struct ScreenShareController {
    device: Arc<dyn CaptureDevice>,
    debounce: Duration,
    active: SharedSlot,
    events: mpsc::UnboundedSender<ScreenShareEvent>,
    next_id: u64,
}

impl ScreenShareController {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ScreenShareEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            device,
            debounce,
            active: Arc::new(Mutex::new(None)),
            events,
            next_id: 0,
        };
        (controller, rx)
    }

    /// Starts a new share, stopping any previous one first.
    pub async fn start(&mut self) -> Result<ScreenShareSession, CaptureError> {
        self.stop();

        let handle = self.device.open_display().await?;
        self.next_id += 1;
        let share_id = self.next_id;

        let session = ScreenShareSession {
            id: share_id,
            tracks: handle.tracks.clone(),
        };

        // Held across the spawn so the listener cannot observe an empty slot
        // or report anything before `Started`.
        let mut slot = lock(&self.active);
        let listener = tokio::spawn(listen(
            share_id,
            handle.signals,
            self.debounce,
            self.active.clone(),
            self.events.clone(),
        ));
        *slot = Some(ActiveShare {
            id: share_id,
            tracks: handle.tracks,
            listener,
        });
        info!("Screen share {} started", share_id);
        let _ = self.events.send(ScreenShareEvent::Started { share_id });
        drop(slot);

        Ok(session)
    }

    /// No-op when nothing is being shared.
    pub fn stop(&mut self) {
        let Some(share) = lock(&self.active).take() else {
            return;
        };

        // Listener first, so stopping the tracks cannot echo back as `Ended`.
        share.listener.abort();
        for track in &share.tracks {
            track.stop();
        }

        info!("Screen share {} stopped", share.id);
        let _ = self.events.send(ScreenShareEvent::Stopped { share_id: share.id });
    }

    pub fn is_sharing(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub fn current(&self) -> Option<ScreenShareSession> {
        lock(&self.active).as_ref().map(|share| ScreenShareSession {
            id: share.id,
            tracks: share.tracks.clone(),
        })
    }
}

impl Drop for ScreenShareController {
    fn drop(&mut self) {
        if let Some(share) = lock(&self.active).take() {
            share.listener.abort();
            for track in &share.tracks {
                track.stop();
            }
        }
    }
}

/// Trailing-edge debounce over mute flicker; only a change against the
/// last reported state is surfaced.
async fn listen(
    share_id: u64,
    mut signals: mpsc::UnboundedReceiver<TrackSignal>,
    debounce: Duration,
    active: SharedSlot,
    events: mpsc::UnboundedSender<ScreenShareEvent>,
) {
    let mut reported_muted = false;
    let mut observed_muted = false;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(TrackSignal::Muted) => {
                    observed_muted = true;
                    deadline = Some(Instant::now() + debounce);
                }
                Some(TrackSignal::Unmuted) => {
                    observed_muted = false;
                    deadline = Some(Instant::now() + debounce);
                }
                Some(TrackSignal::Ended) | None => break,
            },

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                if observed_muted == reported_muted {
                    debug!("Screen share {} mute flicker settled unchanged", share_id);
                    continue;
                }
                reported_muted = observed_muted;
                let event = if observed_muted {
                    ScreenShareEvent::Muted { share_id }
                } else {
                    ScreenShareEvent::Unmuted { share_id }
                };
                let _ = events.send(event);
            }
        }
    }

    let ended = {
        let mut slot = lock(&active);
        match slot.as_ref() {
            Some(share) if share.id == share_id => slot.take(),
            _ => None,
        }
    };
    if let Some(share) = ended {
        for track in &share.tracks {
            track.stop();
        }
        info!("Screen share {} ended by the capture device", share_id);
        let _ = events.send(ScreenShareEvent::Ended { share_id });
    }
}
