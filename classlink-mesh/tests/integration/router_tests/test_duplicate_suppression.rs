use classlink_core::{IceCandidate, Role, SessionDescription, SignalKind, SignalingMessage};
use classlink_mesh::signaling::{DropReason, RouteOutcome};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::integration::router_tests::{Desk, WINDOW};
use crate::utils::RecordingHandler;

#[tokio::test(start_paused = true)]
async fn test_join_requests_inside_the_window_dispatch_once() {
    init_tracing();
    let mut desk = Desk::new(Role::Presenter);
    let mut handler = RecordingHandler::new();

    let first = desk.deliver(desk.join_request()).await;
    tokio::time::advance(Duration::from_millis(100)).await;
    let second = desk.deliver(desk.join_request()).await;

    assert_eq!(
        desk.router.route(first, &mut handler).await,
        RouteOutcome::Dispatched(SignalKind::JoinRequest)
    );
    assert_eq!(
        desk.router.route(second, &mut handler).await,
        RouteOutcome::Dropped(DropReason::Suppressed)
    );
    assert_eq!(handler.count(SignalKind::JoinRequest), 1);
}

#[tokio::test(start_paused = true)]
async fn test_join_request_after_the_window_dispatches_again() {
    init_tracing();
    let mut desk = Desk::new(Role::Presenter);
    let mut handler = RecordingHandler::new();

    let first = desk.deliver(desk.join_request()).await;
    desk.router.route(first, &mut handler).await;
    tokio::time::advance(WINDOW + Duration::from_millis(1)).await;
    let later = desk.deliver(desk.join_request()).await;

    assert_eq!(
        desk.router.route(later, &mut handler).await,
        RouteOutcome::Dispatched(SignalKind::JoinRequest)
    );
    assert_eq!(handler.count(SignalKind::JoinRequest), 2);
}

#[tokio::test]
async fn test_redelivered_id_is_dropped() {
    init_tracing();
    let mut desk = Desk::new(Role::Presenter);
    let mut handler = RecordingHandler::new();
    let signal = desk.deliver(desk.join_request()).await;

    desk.router.route(signal.clone(), &mut handler).await;
    let again = desk.router.route(signal, &mut handler).await;

    assert_eq!(again, RouteOutcome::Dropped(DropReason::AlreadyProcessed));
    assert_eq!(handler.calls.len(), 1);
}

#[tokio::test]
async fn test_distinct_candidates_are_not_suppressed() {
    init_tracing();
    let mut desk = Desk::new(Role::Presenter);
    let mut handler = RecordingHandler::new();

    for c in ["candidate:1", "candidate:2", "candidate:1"] {
        let signal = desk
            .deliver(SignalingMessage::ice_candidate(
                desk.session.clone(),
                desk.peer.clone(),
                desk.me.clone(),
                IceCandidate::new(c),
            ))
            .await;
        desk.router.route(signal, &mut handler).await;
    }

    assert_eq!(handler.count(SignalKind::IceCandidate), 2);
}

#[tokio::test]
async fn test_suppressed_duplicates_are_acknowledged() {
    init_tracing();
    let mut desk = Desk::new(Role::Presenter);
    let mut handler = RecordingHandler::new();

    let first = desk.deliver(desk.join_request()).await;
    let second = desk.deliver(desk.join_request()).await;
    desk.router.route(first, &mut handler).await;
    desk.router.route(second, &mut handler).await;

    assert_eq!(desk.relay.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_new_offer_inside_the_window_is_dispatched() {
    init_tracing();
    let mut viewer = Desk::new(Role::Viewer);
    let mut handler = RecordingHandler::new();
    let offer = |desk: &Desk, sdp: &str| {
        SignalingMessage::offer(
            desk.session.clone(),
            desk.peer.clone(),
            desk.me.clone(),
            SessionDescription::offer(sdp),
        )
    };

    let first = viewer.deliver(offer(&viewer, "v=0 first")).await;
    tokio::time::advance(Duration::from_millis(300)).await;
    let reoffer = viewer.deliver(offer(&viewer, "v=0 second")).await;
    tokio::time::advance(Duration::from_millis(100)).await;
    let resent = viewer.deliver(offer(&viewer, "v=0 second")).await;

    assert_eq!(
        viewer.router.route(first, &mut handler).await,
        RouteOutcome::Dispatched(SignalKind::Offer)
    );
    assert_eq!(
        viewer.router.route(reoffer, &mut handler).await,
        RouteOutcome::Dispatched(SignalKind::Offer)
    );
    assert_eq!(
        viewer.router.route(resent, &mut handler).await,
        RouteOutcome::Dropped(DropReason::Suppressed)
    );
    assert_eq!(handler.count(SignalKind::Offer), 2);
}
