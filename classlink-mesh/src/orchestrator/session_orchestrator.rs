use crate::capture::{CaptureSource, LocalMediaSession};
use crate::config::{MeshConfig, ReconnectPolicy};
use crate::error::{DispatchError, SessionError};
use crate::orchestrator::{
    Negotiator, SessionCommand, SessionContext, SessionDeps, SessionEvent, SessionHandle,
    SessionSnapshot,
};
use crate::peer::{PeerConfig, PeerEvent, PeerSessionManager};
use crate::screen_share::{ScreenShareController, ScreenShareEvent};
use crate::signaling::{RouteOutcome, SignalRouter, SignalingTransport, Subscription};
use crate::transport::TransportEvent;
use classlink_core::{DeliveredSignal, MediaKind, ParticipantId, Role, SignalingMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

enum Internal {
    SendJoinRequest,
    Reconnect(ParticipantId),
    CaptureEnded,
}

/// The event loop of one participant in one classroom session.
///
/// Everything that touches peer state runs on this loop, one event at a
/// time: signaling messages, transport callbacks, commands from the
/// [`SessionHandle`] and timers.
pub struct SessionOrchestrator {
    ctx: SessionContext,
    config: MeshConfig,
    signaling: Arc<dyn SignalingTransport>,
    capture: CaptureSource,
    manager: PeerSessionManager,
    router: SignalRouter,
    screen_share: ScreenShareController,
    local_media: Option<LocalMediaSession>,
    subscription: Option<Subscription>,
    commands: mpsc::Receiver<SessionCommand>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    peer_rx: mpsc::UnboundedReceiver<PeerEvent>,
    screen_rx: mpsc::UnboundedReceiver<ScreenShareEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    events: mpsc::UnboundedSender<SessionEvent>,
    join_timer: Option<JoinHandle<()>>,
    reconnect_timers: HashMap<ParticipantId, JoinHandle<()>>,
    reconnect_attempts: HashMap<ParticipantId, u32>,
    leaving: bool,
}

impl SessionOrchestrator {
    /// Subscribes to signaling and starts the session loop.
    ///
    /// Local media is acquired on the loop, so its outcome arrives as a
    /// [`SessionEvent`] rather than failing entry.
    pub async fn enter(
        ctx: SessionContext,
        config: MeshConfig,
        deps: SessionDeps,
    ) -> Result<SessionHandle, SessionError> {
        let subscription = deps.signaling.subscribe(&ctx.session, &ctx.me).await?;

        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let (manager, transport_rx) =
            PeerSessionManager::new(deps.transports, PeerConfig::from(&config), peer_tx);
        let (screen_share, screen_rx) =
            ScreenShareController::new(deps.capture.clone(), config.mute_debounce());
        let router = SignalRouter::new(
            ctx.session.clone(),
            ctx.me.clone(),
            ctx.role,
            deps.signaling.clone(),
            config.suppression_window(),
        );

        let (command_tx, commands) = mpsc::channel(64);
        let (events, event_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let orchestrator = Self {
            ctx: ctx.clone(),
            config,
            signaling: deps.signaling,
            capture: CaptureSource::new(deps.capture),
            manager,
            router,
            screen_share,
            local_media: None,
            subscription: Some(subscription),
            commands,
            transport_rx,
            peer_rx,
            screen_rx,
            internal_tx,
            internal_rx,
            events,
            join_timer: None,
            reconnect_timers: HashMap::new(),
            reconnect_attempts: HashMap::new(),
            leaving: false,
        };

        let task = tokio::spawn(orchestrator.run());
        Ok(SessionHandle::new(ctx, command_tx, event_rx, task))
    }

    async fn run(mut self) {
        info!(
            "Entered session {} as {} ({})",
            self.ctx.session, self.ctx.me, self.ctx.role
        );

        self.acquire_local_media().await;
        if self.ctx.role == Role::Viewer {
            self.schedule_join_request(self.config.join_request_delay());
        }

        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(SessionCommand::Leave { reply }) => {
                            self.teardown().await;
                            let _ = reply.send(());
                            return;
                        }
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Session handle dropped, leaving {}", self.ctx.session);
                            break;
                        }
                    }
                }

                signal = next_signal(&mut self.subscription) => {
                    match signal {
                        Some(s) => self.handle_signal(s).await,
                        None => {
                            warn!("Signaling subscription for {} closed", self.ctx.session);
                            self.subscription = None;
                        }
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.manager.handle_transport_event(evt);
                }

                Some(evt) = self.peer_rx.recv() => {
                    self.handle_peer_event(evt).await;
                }

                Some(evt) = self.screen_rx.recv() => {
                    self.forward(SessionEvent::ScreenShare(evt));
                }

                Some(internal) = self.internal_rx.recv() => {
                    self.handle_internal(internal).await;
                }
            }
        }

        self.teardown().await;
    }

    async fn acquire_local_media(&mut self) {
        let result = self
            .capture
            .acquire_with_fallback(self.ctx.want_audio, self.ctx.want_video)
            .await;

        match result {
            Ok(mut media) => {
                let internal = self.internal_tx.clone();
                media.on_capture_ended(move || {
                    let _ = internal.send(Internal::CaptureEnded);
                });

                self.manager.set_local_tracks(media.tracks().to_vec());
                self.forward(SessionEvent::LocalMediaReady {
                    audio: media.has_audio(),
                    video: media.has_video(),
                });
                self.local_media = Some(media);
            }
            Err(error) => {
                warn!("Continuing without local media: {}", error);
                self.forward(SessionEvent::LocalMediaUnavailable { error });
            }
        }
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::SetTrackEnabled {
                kind,
                enabled,
                reply,
            } => {
                let found = self
                    .local_media
                    .as_ref()
                    .is_some_and(|media| media.set_track_enabled(kind, enabled));
                let _ = reply.send(found);
            }

            SessionCommand::StartScreenShare { reply } => {
                let result = self.screen_share.start().await.map_err(SessionError::from);
                let _ = reply.send(result);
            }

            SessionCommand::StopScreenShare { reply } => {
                self.screen_share.stop();
                let _ = reply.send(());
            }

            SessionCommand::Rejoin { reply } => {
                let result = if self.ctx.role == Role::Viewer {
                    if let Some(timer) = self.join_timer.take() {
                        timer.abort();
                    }
                    self.send_join_request().await
                } else {
                    Err(SessionError::WrongRole(self.ctx.role))
                };
                let _ = reply.send(result);
            }

            SessionCommand::Reconnect { remote, reply } => {
                let result = if self.ctx.role != Role::Presenter {
                    Err(SessionError::WrongRole(self.ctx.role))
                } else if !self.manager.contains(&remote) {
                    Err(SessionError::UnknownPeer(remote))
                } else {
                    self.initiate_connection(&remote).await
                };
                let _ = reply.send(result);
            }

            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }

            SessionCommand::Leave { reply } => {
                self.teardown().await;
                let _ = reply.send(());
            }
        }
    }

    async fn handle_signal(&mut self, signal: DeliveredSignal) {
        if self.leaving {
            return;
        }

        let mut negotiator = Negotiator {
            ctx: &self.ctx,
            manager: &mut self.manager,
            signaling: &self.signaling,
            events: &self.events,
        };
        let outcome = self.router.route(signal, &mut negotiator).await;
        match outcome {
            RouteOutcome::Failed(DispatchError::Negotiation(error)) => {
                self.forward(SessionEvent::NegotiationFailed { error });
            }
            RouteOutcome::Failed(DispatchError::Signaling(error)) => {
                self.forward(SessionEvent::PublishFailed { error });
            }
            RouteOutcome::Dispatched(_) | RouteOutcome::Dropped(_) => {}
        }
    }

    async fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::LocalCandidateGenerated { remote, candidate } => {
                if self.leaving {
                    return;
                }
                let message = SignalingMessage::ice_candidate(
                    self.ctx.session.clone(),
                    self.ctx.me.clone(),
                    remote,
                    candidate,
                );
                if let Err(error) = self.signaling.publish(message).await {
                    warn!("Failed to relay local candidate: {}", error);
                    self.forward(SessionEvent::PublishFailed { error });
                }
            }

            PeerEvent::PeerConnected { remote } => {
                self.reconnect_attempts.remove(&remote);
                if let Some(timer) = self.reconnect_timers.remove(&remote) {
                    timer.abort();
                }
                self.forward(SessionEvent::PeerConnected { remote });
            }

            PeerEvent::PeerDisconnected { remote } => {
                self.forward(SessionEvent::PeerDisconnected {
                    remote: remote.clone(),
                });
                self.schedule_reconnect(remote);
            }

            PeerEvent::RemoteStreamAdded { remote, stream } => {
                self.forward(SessionEvent::RemoteStreamAdded { remote, stream });
            }

            PeerEvent::RemoteStreamRemoved { remote } => {
                self.forward(SessionEvent::RemoteStreamRemoved { remote });
            }
        }
    }

    async fn handle_internal(&mut self, internal: Internal) {
        if self.leaving {
            return;
        }

        match internal {
            Internal::SendJoinRequest => {
                self.join_timer = None;
                let _ = self.send_join_request().await;
            }

            Internal::Reconnect(remote) => {
                self.reconnect_timers.remove(&remote);
                let result = match self.ctx.role {
                    Role::Viewer => self.send_join_request().await,
                    Role::Presenter => self.initiate_connection(&remote).await,
                };
                if let Err(e) = result {
                    warn!("Reconnect to {} failed: {}", remote, e);
                }
            }

            Internal::CaptureEnded => {
                info!("Local capture revoked, detaching from all peers");
                if let Some(mut media) = self.local_media.take() {
                    media.stop();
                }
                self.manager.release_local_tracks().await;
                self.forward(SessionEvent::LocalMediaEnded);
            }
        }
    }

    async fn initiate_connection(&mut self, remote: &ParticipantId) -> Result<(), SessionError> {
        let mut negotiator = Negotiator {
            ctx: &self.ctx,
            manager: &mut self.manager,
            signaling: &self.signaling,
            events: &self.events,
        };
        let result = negotiator.initiate_connection(remote).await;
        match result {
            Ok(()) => Ok(()),
            Err(DispatchError::Negotiation(error)) => {
                self.forward(SessionEvent::NegotiationFailed {
                    error: error.clone(),
                });
                Err(error.into())
            }
            Err(DispatchError::Signaling(error)) => {
                self.forward(SessionEvent::PublishFailed {
                    error: error.clone(),
                });
                Err(error.into())
            }
        }
    }

    async fn send_join_request(&mut self) -> Result<(), SessionError> {
        let message = SignalingMessage::join_request(
            self.ctx.session.clone(),
            self.ctx.me.clone(),
            self.ctx.presenter.clone(),
        );

        match self.signaling.publish(message).await {
            Ok(id) => {
                info!("Join request {} sent to {}", id, self.ctx.presenter);
                self.forward(SessionEvent::JoinRequested);
                Ok(())
            }
            Err(error) => {
                warn!("Join request failed: {}", error);
                self.forward(SessionEvent::PublishFailed {
                    error: error.clone(),
                });
                Err(error.into())
            }
        }
    }

    fn schedule_join_request(&mut self, delay: Duration) {
        let internal = self.internal_tx.clone();
        self.join_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal.send(Internal::SendJoinRequest);
        }));
    }

    fn schedule_reconnect(&mut self, remote: ParticipantId) {
        let ReconnectPolicy::Automatic {
            delay_ms,
            max_attempts,
        } = self.config.reconnect
        else {
            return;
        };
        if self.leaving {
            return;
        }

        let attempts = self.reconnect_attempts.entry(remote.clone()).or_insert(0);
        if *attempts >= max_attempts {
            warn!(
                "Giving up on {} after {} reconnect attempts",
                remote, max_attempts
            );
            return;
        }
        *attempts += 1;
        let attempt = *attempts;

        info!("Reconnect attempt {} to {} in {}ms", attempt, remote, delay_ms);
        let internal = self.internal_tx.clone();
        let target = remote.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = internal.send(Internal::Reconnect(target));
        });
        if let Some(previous) = self.reconnect_timers.insert(remote.clone(), timer) {
            previous.abort();
        }

        self.forward(SessionEvent::ReconnectScheduled { remote, attempt });
    }

    fn snapshot(&self) -> SessionSnapshot {
        let enabled = |kind: MediaKind| {
            self.local_media
                .as_ref()
                .and_then(|media| media.is_enabled(kind))
        };

        SessionSnapshot {
            session: self.ctx.session.clone(),
            me: self.ctx.me.clone(),
            role: self.ctx.role,
            peers: self.manager.snapshot(),
            audio_enabled: enabled(MediaKind::Audio),
            video_enabled: enabled(MediaKind::Video),
            screen_share: self.screen_share.current().map(|share| share.id),
        }
    }

    /// Idempotent. After this nothing more is published.
    async fn teardown(&mut self) {
        if self.leaving {
            return;
        }
        self.leaving = true;
        info!("Leaving session {}", self.ctx.session);

        if let Some(timer) = self.join_timer.take() {
            timer.abort();
        }
        for (_, timer) in self.reconnect_timers.drain() {
            timer.abort();
        }
        self.subscription = None;

        self.manager.close_all().await;
        if let Some(mut media) = self.local_media.take() {
            media.stop();
        }
        self.screen_share.stop();

        while let Ok(event) = self.peer_rx.try_recv() {
            self.handle_peer_event(event).await;
        }
        while let Ok(event) = self.screen_rx.try_recv() {
            self.forward(SessionEvent::ScreenShare(event));
        }

        self.forward(SessionEvent::Left);
    }

    fn forward(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

async fn next_signal(subscription: &mut Option<Subscription>) -> Option<DeliveredSignal> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
