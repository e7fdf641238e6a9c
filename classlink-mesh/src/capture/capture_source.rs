use crate::capture::{CaptureDevice, CaptureHandle, LocalTrack, MediaConstraints, TrackSignal};
use crate::error::CaptureError;
use classlink_core::MediaKind;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Camera/microphone acquisition with the relaxed-constraints fallback.
#[derive(Clone)]
pub struct CaptureSource {
    device: Arc<dyn CaptureDevice>,
}

impl CaptureSource {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self { device }
    }

    pub async fn acquire(
        &self,
        want_audio: bool,
        want_video: bool,
    ) -> Result<LocalMediaSession, CaptureError> {
        let constraints = MediaConstraints {
            audio: want_audio,
            video: want_video,
        };
        if constraints.is_empty() {
            return Err(CaptureError::NothingRequested);
        }

        let handle = self.device.open_user_media(constraints).await?;
        let session = LocalMediaSession::new(handle);
        info!(
            "Local media acquired (audio: {}, video: {})",
            session.has_audio(),
            session.has_video()
        );
        Ok(session)
    }

    /// Walks video+audio, then audio-only. The error is the last one seen;
    /// callers fall through to signaling-only participation on `Err`.
    pub async fn acquire_with_fallback(
        &self,
        want_audio: bool,
        want_video: bool,
    ) -> Result<LocalMediaSession, CaptureError> {
        let mut steps = Vec::with_capacity(2);
        if want_video {
            steps.push((want_audio, true));
        }
        if want_audio {
            steps.push((true, false));
        }

        let mut last_error = CaptureError::NothingRequested;
        for (audio, video) in steps {
            match self.acquire(audio, video).await {
                Ok(session) => return Ok(session),
                Err(e) if e.allows_fallback() => {
                    warn!(
                        "Capture (audio: {}, video: {}) failed: {}. Relaxing constraints",
                        audio, video, e
                    );
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}

/// The current camera/microphone capture.
pub struct LocalMediaSession {
    tracks: Vec<Arc<LocalTrack>>,
    signals: Option<mpsc::UnboundedReceiver<TrackSignal>>,
    watcher: Option<JoinHandle<()>>,
}

impl LocalMediaSession {
    pub fn new(handle: CaptureHandle) -> Self {
        Self {
            tracks: handle.tracks,
            signals: Some(handle.signals),
            watcher: None,
        }
    }

    pub fn tracks(&self) -> &[Arc<LocalTrack>] {
        &self.tracks
    }

    pub fn track(&self, kind: MediaKind) -> Option<&Arc<LocalTrack>> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    pub fn has_audio(&self) -> bool {
        self.track(MediaKind::Audio).is_some()
    }

    pub fn has_video(&self) -> bool {
        self.track(MediaKind::Video).is_some()
    }

    pub fn is_enabled(&self, kind: MediaKind) -> Option<bool> {
        self.track(kind).map(|t| t.is_enabled())
    }

    /// Returns `false` when the session holds no track of `kind`.
    pub fn set_track_enabled(&self, kind: MediaKind, enabled: bool) -> bool {
        let mut found = false;
        for track in self.tracks.iter().filter(|t| t.kind() == kind) {
            track.set_enabled(enabled);
            found = true;
        }
        found
    }

    /// Runs `callback` once if the device revokes the capture. Only the
    /// first registration takes effect.
    pub fn on_capture_ended<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(mut signals) = self.signals.take() else {
            return;
        };
        let tracks = self.tracks.clone();

        self.watcher = Some(tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                match signal {
                    TrackSignal::Ended => {
                        info!("Local capture ended out-of-band");
                        for track in &tracks {
                            track.stop();
                        }
                        callback();
                        return;
                    }
                    other => debug!("Local capture signal: {:?}", other),
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        self.signals = None;
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl Drop for LocalMediaSession {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}
