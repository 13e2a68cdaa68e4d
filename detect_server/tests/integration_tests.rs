use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::types::{BoundingBox, Detection};
use detect_server::media::{CaptureSource, MediaSession, StreamConstraints};
use detect_server::renderer::RenderSink;
use detect_server::session::{SessionController, SessionError, SessionState};
use detect_server::stub::{StubCaptureSource, StubDetector};
use image::RgbImage;

struct RecordingSink {
    renders: AtomicUsize,
    clears: AtomicUsize,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            renders: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        }
    }

    fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl RenderSink for RecordingSink {
    fn render(&self, _frame: &RgbImage, _detections: &[Detection]) {
        self.renders.fetch_add(1, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

fn sample_detections() -> Vec<Detection> {
    vec![
        Detection::new(
            "cat",
            0.92,
            BoundingBox {
                x: 10.0,
                y: 10.0,
                width: 50.0,
                height: 50.0,
            },
        ),
        Detection::new(
            "dog",
            0.81,
            BoundingBox {
                x: 60.0,
                y: 10.0,
                width: 40.0,
                height: 40.0,
            },
        ),
    ]
}

fn controller_with(
    source: Arc<StubCaptureSource>,
    detector: Arc<StubDetector>,
    sink: Arc<RecordingSink>,
    cadence: Duration,
) -> SessionController {
    SessionController::new(
        MediaSession::new(source as Arc<dyn CaptureSource>),
        detector,
        sink,
        StreamConstraints {
            ideal_width: 160,
            ideal_height: 120,
        },
        cadence,
    )
}

/// Poll until the condition holds, or give up after one second.
async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[tokio::test]
async fn test_start_detects_and_stop_releases() -> Result<(), SessionError> {
    let source = Arc::new(StubCaptureSource::new());
    let detector = Arc::new(StubDetector::new(sample_detections()));
    let sink = Arc::new(RecordingSink::new());
    let controller = controller_with(
        source,
        detector.clone(),
        sink.clone(),
        Duration::from_millis(5),
    );

    controller.start().await?;
    assert_eq!(controller.state(), SessionState::Detecting);
    assert_eq!(controller.active_tracks(), 1);
    assert!(controller.status_text().contains("160x120"));

    assert!(eventually(|| detector.calls() >= 3).await);
    assert!(sink.renders() >= 2);

    controller.stop().await?;
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(controller.active_tracks(), 0);
    assert_eq!(sink.clears(), 1);

    // No render happens once stop returned.
    let renders_after_stop = sink.renders();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.renders(), renders_after_stop);

    Ok(())
}

#[tokio::test]
async fn test_detect_calls_never_overlap() -> Result<(), SessionError> {
    let source = Arc::new(StubCaptureSource::new());
    // Inference far slower than the cadence, so ticks pile up if the loop
    // ever scheduled a pass before the previous one settled.
    let detector = Arc::new(StubDetector::new(vec![]).with_delay(Duration::from_millis(20)));
    let sink = Arc::new(RecordingSink::new());
    let controller = controller_with(
        source,
        detector.clone(),
        sink.clone(),
        Duration::from_millis(1),
    );

    controller.start().await?;
    assert!(eventually(|| detector.calls() >= 4).await);
    controller.stop().await?;

    assert_eq!(detector.max_in_flight(), 1);
    // Empty results still repaint the plain frame.
    assert!(sink.renders() >= 3);

    Ok(())
}

#[tokio::test]
async fn test_detector_failure_does_not_stop_the_loop() -> Result<(), SessionError> {
    let source = Arc::new(StubCaptureSource::new());
    let detector = Arc::new(StubDetector::new(vec![]).fail_on_calls(vec![2]));
    let sink = Arc::new(RecordingSink::new());
    let controller = controller_with(
        source,
        detector.clone(),
        sink.clone(),
        Duration::from_millis(2),
    );

    controller.start().await?;
    assert!(eventually(|| detector.calls() >= 5).await);
    controller.stop().await?;

    // Every pass except the failed one reached the renderer.
    assert!(sink.renders() >= detector.calls() - 2);

    Ok(())
}

#[tokio::test]
async fn test_denied_camera_recovers_to_idle() -> Result<(), SessionError> {
    let source = Arc::new(StubCaptureSource::new());
    let detector = Arc::new(StubDetector::new(sample_detections()));
    let sink = Arc::new(RecordingSink::new());
    source.deny_next();
    let controller = controller_with(
        source,
        detector.clone(),
        sink.clone(),
        Duration::from_millis(5),
    );

    let denied = controller.start().await;
    assert!(matches!(denied, Err(SessionError::Media(_))));
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(controller.active_tracks(), 0);
    assert!(controller.status_text().contains("camera unavailable"));
    assert_eq!(sink.renders(), 0);

    // The control is usable again: a retry succeeds.
    controller.start().await?;
    assert_eq!(controller.state(), SessionState::Detecting);
    controller.stop().await?;

    Ok(())
}

#[tokio::test]
async fn test_control_is_never_left_disabled() -> Result<(), SessionError> {
    let source = Arc::new(StubCaptureSource::new());
    let detector = Arc::new(StubDetector::new(vec![]));
    let sink = Arc::new(RecordingSink::new());
    let controller = controller_with(source, detector, sink, Duration::from_millis(5));

    controller.start().await?;
    assert!(matches!(
        controller.start().await,
        Err(SessionError::AlreadyRunning)
    ));
    assert_eq!(controller.state(), SessionState::Detecting);

    controller.stop().await?;
    assert!(matches!(
        controller.stop().await,
        Err(SessionError::NotRunning)
    ));
    assert_eq!(controller.state(), SessionState::Idle);

    // A full second round works; no transition leaves the control stuck.
    controller.start().await?;
    assert_eq!(controller.state(), SessionState::Detecting);
    controller.stop().await?;
    assert_eq!(controller.state(), SessionState::Idle);

    Ok(())
}
