use classlink_core::{ConnectionState, MediaKind, ParticipantId};
use classlink_mesh::capture::SyntheticCaptureDevice;
use classlink_mesh::{CaptureError, SessionContext, SessionDeps, SessionEvent, SessionOrchestrator};
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{Classroom, MockTransportFactory, wait_connected, wait_for_event};

#[tokio::test]
async fn test_viewer_without_capture_still_joins() {
    init_tracing();
    let classroom = Classroom::new();
    let mut presenter = classroom.enter_presenter().await;
    let mut viewer = classroom
        .enter_viewer_with(SyntheticCaptureDevice::new().with_audio_error(CaptureError::PermissionDenied))
        .await;

    let unavailable = wait_for_event(&mut viewer.handle, 1000, |e| {
        matches!(e, SessionEvent::LocalMediaUnavailable { .. })
    })
    .await;
    assert!(matches!(
        unavailable,
        Some(SessionEvent::LocalMediaUnavailable {
            error: CaptureError::PermissionDenied
        })
    ));

    assert!(wait_connected(&mut viewer.handle, 2000).await);
    assert!(wait_connected(&mut presenter.handle, 2000).await);

    let snapshot = viewer.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.audio_enabled, None);
    assert_eq!(snapshot.video_enabled, None);
    assert!(snapshot.peer(&classroom.presenter).unwrap().has_remote_stream);
}

#[tokio::test]
async fn test_missing_camera_falls_back_to_audio() {
    init_tracing();
    let classroom = Classroom::new();
    let mut presenter = classroom.enter_presenter().await;
    let mut viewer = classroom
        .enter_viewer_with(SyntheticCaptureDevice::new().with_video_error(CaptureError::DeviceNotFound))
        .await;

    let ready = wait_for_event(&mut viewer.handle, 1000, |e| {
        matches!(e, SessionEvent::LocalMediaReady { .. })
    })
    .await;
    assert!(matches!(
        ready,
        Some(SessionEvent::LocalMediaReady {
            audio: true,
            video: false
        })
    ));

    let received = wait_for_event(&mut presenter.handle, 2000, |e| {
        matches!(e, SessionEvent::RemoteStreamAdded { .. })
    })
    .await;
    let Some(SessionEvent::RemoteStreamAdded { remote, stream }) = received else {
        panic!("presenter never received the viewer's audio");
    };
    assert_eq!(remote, viewer.id);
    assert!(stream.has_kind(MediaKind::Audio));
    assert!(!stream.has_kind(MediaKind::Video));
}

#[tokio::test]
async fn test_receive_only_viewer_asks_for_no_media() {
    init_tracing();
    let classroom = Classroom::new();
    let device = Arc::new(SyntheticCaptureDevice::new());
    let ctx = SessionContext::viewer(
        classroom.session.clone(),
        ParticipantId::new(),
        classroom.presenter.clone(),
    )
    .with_media(false, false);
    let deps = SessionDeps {
        signaling: Arc::new(classroom.relay.clone()),
        capture: device.clone(),
        transports: Arc::new(MockTransportFactory::new()),
    };
    let mut handle = SessionOrchestrator::enter(ctx, classroom.config.clone(), deps)
        .await
        .unwrap();

    let unavailable = wait_for_event(&mut handle, 1000, |e| {
        matches!(e, SessionEvent::LocalMediaUnavailable { .. })
    })
    .await;

    assert!(matches!(
        unavailable,
        Some(SessionEvent::LocalMediaUnavailable {
            error: CaptureError::NothingRequested
        })
    ));
    assert!(device.attempts().is_empty());
    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_capture_ended_detaches_tracks_from_peers() {
    init_tracing();
    let classroom = Classroom::new();
    let mut presenter = classroom.enter_presenter().await;
    let mut viewer = classroom.enter_viewer().await;
    assert!(wait_connected(&mut viewer.handle, 2000).await);
    assert!(wait_connected(&mut presenter.handle, 2000).await);

    let control = presenter.device.last_user_control().unwrap();
    control.end();

    let ended = wait_for_event(&mut presenter.handle, 1000, |e| {
        matches!(e, SessionEvent::LocalMediaEnded)
    })
    .await;
    assert!(ended.is_some());
    assert!(presenter.transports.last().unwrap().is_detached());
    assert!(control.tracks().iter().all(|t| t.is_ended()));

    let snapshot = presenter.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.audio_enabled, None);
    assert_eq!(
        snapshot.peer(&viewer.id).map(|p| p.connection_state),
        Some(ConnectionState::Connected)
    );
}
