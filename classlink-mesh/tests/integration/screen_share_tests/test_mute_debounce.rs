use classlink_mesh::capture::SyntheticCaptureDevice;
use classlink_mesh::{ScreenShareController, ScreenShareEvent};
use std::sync::Arc;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::integration::screen_share_tests::drain;

const DEBOUNCE: Duration = Duration::from_millis(300);
const FLICKER: Duration = Duration::from_millis(50);

#[tokio::test(start_paused = true)]
async fn test_mute_flicker_settles_into_one_event() {
    init_tracing();
    let device = Arc::new(SyntheticCaptureDevice::new());
    let (mut controller, mut rx) = ScreenShareController::new(device.clone(), DEBOUNCE);
    let share = controller.start().await.unwrap();
    let control = device.last_display_control().unwrap();

    control.mute();
    tokio::time::sleep(FLICKER).await;
    control.unmute();
    tokio::time::sleep(FLICKER).await;
    control.mute();
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(
        drain(&mut rx),
        vec![
            ScreenShareEvent::Started { share_id: share.id },
            ScreenShareEvent::Muted { share_id: share.id },
        ]
    );
    assert!(controller.is_sharing());
}

#[tokio::test(start_paused = true)]
async fn test_flicker_back_to_the_same_state_reports_nothing() {
    init_tracing();
    let device = Arc::new(SyntheticCaptureDevice::new());
    let (mut controller, mut rx) = ScreenShareController::new(device.clone(), DEBOUNCE);
    let share = controller.start().await.unwrap();
    let control = device.last_display_control().unwrap();

    control.mute();
    tokio::time::sleep(FLICKER).await;
    control.unmute();
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(
        drain(&mut rx),
        vec![ScreenShareEvent::Started { share_id: share.id }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_settled_mute_then_unmute_reports_both() {
    init_tracing();
    let device = Arc::new(SyntheticCaptureDevice::new());
    let (mut controller, mut rx) = ScreenShareController::new(device.clone(), DEBOUNCE);
    let share = controller.start().await.unwrap();
    let control = device.last_display_control().unwrap();

    control.mute();
    tokio::time::sleep(DEBOUNCE * 2).await;
    control.unmute();
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(
        drain(&mut rx),
        vec![
            ScreenShareEvent::Started { share_id: share.id },
            ScreenShareEvent::Muted { share_id: share.id },
            ScreenShareEvent::Unmuted { share_id: share.id },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_end_during_pending_mute_reports_only_ended() {
    init_tracing();
    let device = Arc::new(SyntheticCaptureDevice::new());
    let (mut controller, mut rx) = ScreenShareController::new(device.clone(), DEBOUNCE);
    let share = controller.start().await.unwrap();
    let control = device.last_display_control().unwrap();

    control.mute();
    tokio::time::sleep(FLICKER).await;
    control.end();
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(
        drain(&mut rx),
        vec![
            ScreenShareEvent::Started { share_id: share.id },
            ScreenShareEvent::Ended { share_id: share.id },
        ]
    );
    assert!(!controller.is_sharing());
}
