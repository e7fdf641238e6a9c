use crate::error::SessionError;
use crate::orchestrator::{SessionCommand, SessionContext, SessionEvent, SessionSnapshot};
use crate::screen_share::ScreenShareSession;
use classlink_core::{MediaKind, ParticipantId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

/// Owner's side of a running session. Dropping it leaves the session.
pub struct SessionHandle {
    ctx: SessionContext,
    commands: mpsc::Sender<SessionCommand>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub(crate) fn new(
        ctx: SessionContext,
        commands: mpsc::Sender<SessionCommand>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            ctx,
            commands,
            events,
            task: Some(task),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn me(&self) -> &ParticipantId {
        &self.ctx.me
    }

    /// `None` once the session has left and every event was read.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    /// Mutes or unmutes the local track of `kind` on every peer at once.
    /// Returns `false` when there is no such track.
    pub async fn set_track_enabled(
        &self,
        kind: MediaKind,
        enabled: bool,
    ) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::SetTrackEnabled {
            kind,
            enabled,
            reply,
        })
        .await
    }

    pub async fn start_screen_share(&self) -> Result<ScreenShareSession, SessionError> {
        self.request(|reply| SessionCommand::StartScreenShare { reply })
            .await?
    }

    pub async fn stop_screen_share(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::StopScreenShare { reply })
            .await
    }

    pub async fn rejoin(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Rejoin { reply }).await?
    }

    pub async fn reconnect(&self, remote: ParticipantId) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Reconnect { remote, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Snapshot { reply })
            .await
    }

    /// Closes every peer, stops local capture and screen share, and waits
    /// for the loop to finish. Later calls are no-ops.
    pub async fn leave(&mut self) -> Result<(), SessionError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        let (reply, rx) = oneshot::channel();
        if self.commands.send(SessionCommand::Leave { reply }).await.is_ok() {
            let _ = rx.await;
        }
        if let Err(e) = task.await {
            warn!("Session loop for {} ended abnormally: {}", self.ctx.session, e);
        }
        Ok(())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}
