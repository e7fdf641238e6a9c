use crate::capture::{CaptureDevice, CaptureHandle, LocalTrack, MediaConstraints, TrackSignal};
use crate::error::CaptureError;
use async_trait::async_trait;
use classlink_core::MediaKind;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureAttempt {
    UserMedia(MediaConstraints),
    Display,
}

/// Drives an open synthetic capture the way a browser would.
#[derive(Clone)]
pub struct CaptureControl {
    tx: mpsc::UnboundedSender<TrackSignal>,
    tracks: Vec<Arc<LocalTrack>>,
}

impl CaptureControl {
    pub fn tracks(&self) -> &[Arc<LocalTrack>] {
        &self.tracks
    }

    pub fn mute(&self) {
        let _ = self.tx.send(TrackSignal::Muted);
    }

    pub fn unmute(&self) {
        let _ = self.tx.send(TrackSignal::Unmuted);
    }

    pub fn end(&self) {
        let _ = self.tx.send(TrackSignal::Ended);
    }
}

#[derive(Default)]
struct SyntheticState {
    audio_error: Option<CaptureError>,
    video_error: Option<CaptureError>,
    display_error: Option<CaptureError>,
    attempts: Vec<CaptureAttempt>,
    user_controls: Vec<CaptureControl>,
    display_controls: Vec<CaptureControl>,
}

/// Hardware-free capture device producing real webrtc tracks.
#[derive(Default)]
pub struct SyntheticCaptureDevice {
    state: Mutex<SyntheticState>,
}

impl SyntheticCaptureDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any request that includes audio.
    pub fn with_audio_error(self, error: CaptureError) -> Self {
        self.state().audio_error = Some(error);
        self
    }

    /// Fail any request that includes video.
    pub fn with_video_error(self, error: CaptureError) -> Self {
        self.state().video_error = Some(error);
        self
    }

    pub fn with_display_error(self, error: CaptureError) -> Self {
        self.state().display_error = Some(error);
        self
    }

    pub fn attempts(&self) -> Vec<CaptureAttempt> {
        self.state().attempts.clone()
    }

    pub fn last_user_control(&self) -> Option<CaptureControl> {
        self.state().user_controls.last().cloned()
    }

    pub fn last_display_control(&self) -> Option<CaptureControl> {
        self.state().display_controls.last().cloned()
    }

    fn state(&self) -> MutexGuard<'_, SyntheticState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open(kinds: &[MediaKind], stream_prefix: &str) -> (CaptureHandle, CaptureControl) {
        let stream_id = format!("{}-{}", stream_prefix, uuid::Uuid::new_v4());
        let tracks: Vec<Arc<LocalTrack>> = kinds
            .iter()
            .map(|kind| Arc::new(LocalTrack::new(*kind, &stream_id)))
            .collect();
        let (tx, rx) = mpsc::unbounded_channel();

        let control = CaptureControl {
            tx,
            tracks: tracks.clone(),
        };
        let handle = CaptureHandle {
            tracks,
            signals: rx,
        };
        (handle, control)
    }
}

#[async_trait]
impl CaptureDevice for SyntheticCaptureDevice {
    async fn open_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<CaptureHandle, CaptureError> {
        let mut state = self.state();
        state.attempts.push(CaptureAttempt::UserMedia(constraints));

        if constraints.video {
            if let Some(e) = state.video_error {
                return Err(e);
            }
        }
        if constraints.audio {
            if let Some(e) = state.audio_error {
                return Err(e);
            }
        }

        let mut kinds = Vec::with_capacity(2);
        if constraints.audio {
            kinds.push(MediaKind::Audio);
        }
        if constraints.video {
            kinds.push(MediaKind::Video);
        }

        let (handle, control) = Self::open(&kinds, "camera");
        state.user_controls.push(control);
        Ok(handle)
    }

    async fn open_display(&self) -> Result<CaptureHandle, CaptureError> {
        let mut state = self.state();
        state.attempts.push(CaptureAttempt::Display);

        if let Some(e) = state.display_error {
            return Err(e);
        }

        let (handle, control) = Self::open(&[MediaKind::Video], "screen");
        state.display_controls.push(control);
        Ok(handle)
    }
}
