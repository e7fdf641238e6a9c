use crate::capture::CaptureDevice;
use crate::signaling::SignalingTransport;
use crate::transport::TransportFactory;
use classlink_core::{ParticipantId, Role, SessionId};
use std::sync::Arc;

/// Who we are in which session, as handed over by the record store at entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session: SessionId,
    pub me: ParticipantId,
    pub role: Role,
    pub presenter: ParticipantId,
    pub want_audio: bool,
    pub want_video: bool,
}

impl SessionContext {
    pub fn presenter(session: SessionId, me: ParticipantId) -> Self {
        Self {
            session,
            presenter: me.clone(),
            me,
            role: Role::Presenter,
            want_audio: true,
            want_video: true,
        }
    }

    pub fn viewer(session: SessionId, me: ParticipantId, presenter: ParticipantId) -> Self {
        Self {
            session,
            me,
            role: Role::Viewer,
            presenter,
            want_audio: true,
            want_video: true,
        }
    }

    /// Which local media to ask for on entry. Asking for neither joins
    /// receive-only.
    pub fn with_media(mut self, audio: bool, video: bool) -> Self {
        self.want_audio = audio;
        self.want_video = video;
        self
    }

    pub fn is_presenter(&self) -> bool {
        self.role == Role::Presenter
    }
}

/// External collaborators a session runs against.
#[derive(Clone)]
pub struct SessionDeps {
    pub signaling: Arc<dyn SignalingTransport>,
    pub capture: Arc<dyn CaptureDevice>,
    pub transports: Arc<dyn TransportFactory>,
}
