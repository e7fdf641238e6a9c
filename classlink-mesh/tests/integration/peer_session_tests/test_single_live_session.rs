use classlink_core::{ParticipantId, SessionDescription, SignalingState};

use crate::integration::init_tracing;
use crate::integration::peer_session_tests::harness;

#[tokio::test]
async fn test_create_offer_twice_leaves_one_live_connection() {
    init_tracing();
    let mut h = harness();
    let viewer = ParticipantId::new();

    h.manager.create_offer(&viewer).await.unwrap();
    h.manager.create_offer(&viewer).await.unwrap();

    assert_eq!(h.factory.created_count(), 2);
    assert_eq!(h.factory.live_count(), 1, "old transport must be closed");
    assert_eq!(h.manager.len(), 1);
    assert_eq!(
        h.manager.signaling_state(&viewer),
        Some(SignalingState::HaveLocalOffer)
    );
}

#[tokio::test]
async fn test_accept_offer_twice_leaves_one_live_connection() {
    init_tracing();
    let mut h = harness();
    let presenter = ParticipantId::new();

    h.manager
        .accept_offer(&presenter, SessionDescription::offer("first tracks=0"))
        .await
        .unwrap();
    h.manager
        .accept_offer(&presenter, SessionDescription::offer("second tracks=0"))
        .await
        .unwrap();

    assert_eq!(h.factory.live_count(), 1);
    assert_eq!(h.manager.len(), 1);
    assert_eq!(
        h.manager.signaling_state(&presenter),
        Some(SignalingState::Stable)
    );
}

#[tokio::test]
async fn test_sessions_per_remote_are_independent() {
    init_tracing();
    let mut h = harness();
    let (first, second) = (ParticipantId::new(), ParticipantId::new());

    h.manager.create_offer(&first).await.unwrap();
    h.manager.create_offer(&second).await.unwrap();
    h.manager.close(&first).await;

    assert!(!h.manager.contains(&first));
    assert!(h.manager.contains(&second));
    assert_eq!(h.manager.remotes(), vec![second]);
    assert_eq!(h.factory.live_count(), 1);
}
