use classlink_core::{Role, SignalKind};
use classlink_mesh::signaling::RouteOutcome;
use classlink_mesh::{DispatchError, SignalingError};

use crate::integration::init_tracing;
use crate::integration::router_tests::Desk;
use crate::utils::RecordingHandler;

#[tokio::test]
async fn test_handled_message_is_acknowledged() {
    init_tracing();
    let mut desk = Desk::new(Role::Presenter);
    let mut handler = RecordingHandler::new();
    let signal = desk.deliver(desk.join_request()).await;
    assert_eq!(desk.relay.pending_count(), 1);

    desk.router.route(signal, &mut handler).await;

    assert_eq!(desk.relay.pending_count(), 0);
}

#[tokio::test]
async fn test_failed_message_stays_and_retry_is_not_suppressed() {
    init_tracing();
    let mut desk = Desk::new(Role::Presenter);
    let mut handler = RecordingHandler::new();
    handler.fail_with = Some(DispatchError::Signaling(SignalingError::Publish(
        "relay down".into(),
    )));

    let signal = desk.deliver(desk.join_request()).await;
    let outcome = desk.router.route(signal, &mut handler).await;
    assert!(matches!(outcome, RouteOutcome::Failed(_)));
    assert_eq!(desk.relay.pending_count(), 1);

    handler.fail_with = None;
    let retry = desk.deliver(desk.join_request()).await;
    let outcome = desk.router.route(retry, &mut handler).await;

    assert_eq!(outcome, RouteOutcome::Dispatched(SignalKind::JoinRequest));
    assert_eq!(handler.count(SignalKind::JoinRequest), 2);
}

#[tokio::test]
async fn test_acknowledge_failure_is_not_fatal() {
    init_tracing();
    let mut desk = Desk::new(Role::Presenter);
    let mut handler = RecordingHandler::new();
    desk.relay.set_fail_acknowledge(true);

    let signal = desk.deliver(desk.join_request()).await;
    let outcome = desk.router.route(signal.clone(), &mut handler).await;

    assert_eq!(outcome, RouteOutcome::Dispatched(SignalKind::JoinRequest));
    assert_eq!(desk.relay.pending_count(), 1);

    // The relay may hand the same message out again; it must stay handled.
    desk.router.route(signal, &mut handler).await;
    assert_eq!(handler.calls.len(), 1);
}

#[tokio::test]
async fn test_redelivery_after_failure_is_handled() {
    init_tracing();
    let mut desk = Desk::new(Role::Presenter);
    let mut handler = RecordingHandler::new();
    handler.fail_with = Some(DispatchError::Signaling(SignalingError::Publish(
        "relay down".into(),
    )));

    let signal = desk.deliver(desk.join_request()).await;
    let outcome = desk.router.route(signal.clone(), &mut handler).await;
    assert!(matches!(outcome, RouteOutcome::Failed(_)));

    handler.fail_with = None;
    let outcome = desk.router.route(signal, &mut handler).await;

    assert_eq!(outcome, RouteOutcome::Dispatched(SignalKind::JoinRequest));
    assert_eq!(handler.count(SignalKind::JoinRequest), 2);
    assert_eq!(desk.relay.pending_count(), 0);
}
