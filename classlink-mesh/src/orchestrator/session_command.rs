use crate::error::SessionError;
use crate::orchestrator::SessionSnapshot;
use crate::screen_share::ScreenShareSession;
use classlink_core::{MediaKind, ParticipantId};
use tokio::sync::oneshot;

/// Requests from a [`SessionHandle`](crate::orchestrator::SessionHandle) to
/// the orchestrator loop.
#[derive(Debug)]
pub enum SessionCommand {
    SetTrackEnabled {
        kind: MediaKind,
        enabled: bool,
        reply: oneshot::Sender<bool>,
    },

    StartScreenShare {
        reply: oneshot::Sender<Result<ScreenShareSession, SessionError>>,
    },

    StopScreenShare {
        reply: oneshot::Sender<()>,
    },

    /// Viewer only: announce ourselves to the presenter again.
    Rejoin {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Presenter only: offer again to `remote` unless it is connected.
    Reconnect {
        remote: ParticipantId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },

    Leave {
        reply: oneshot::Sender<()>,
    },
}
