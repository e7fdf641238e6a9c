use crate::capture::LocalTrack;
use crate::error::CaptureError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    pub fn audio_video() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }

    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.audio && !self.video
    }
}

/// Out-of-band notifications a device raises about an open capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSignal {
    Muted,
    Unmuted,
    /// The device or the user revoked the capture.
    Ended,
}

pub struct CaptureHandle {
    pub tracks: Vec<Arc<LocalTrack>>,
    pub signals: mpsc::UnboundedReceiver<TrackSignal>,
}

/// Something that can hand out camera/microphone or screen captures.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn open_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<CaptureHandle, CaptureError>;

    async fn open_display(&self) -> Result<CaptureHandle, CaptureError>;
}
