//! Realtime detection loop.
//!
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::detector::Detector;
use crate::media::{MediaError, MediaHandle};
use crate::meter::METER;
use crate::renderer::RenderSink;

/// Repeatedly runs single detection passes while its token is live.
///
/// Passes are strictly sequential: the next pass is scheduled only after the
/// previous inference settled, paced to the target display cadence. Ticks
/// missed while inference runs are skipped, so slow inference drops frames
/// instead of queueing them; each pass always sees the freshest frame.
///
/// Cancellation is cooperative: the token is checked at iteration
/// boundaries, an in-flight pass is allowed to finish and its result is
/// discarded.
pub struct DetectionLoop {
    handle: MediaHandle,
    detector: Arc<dyn Detector>,
    renderer: Arc<dyn RenderSink>,
    cancel: CancellationToken,
    cadence: Duration,
}

impl DetectionLoop {
    pub fn new(
        handle: MediaHandle,
        detector: Arc<dyn Detector>,
        renderer: Arc<dyn RenderSink>,
        cancel: CancellationToken,
        cadence: Duration,
    ) -> Self {
        Self {
            handle,
            detector,
            renderer,
            cancel,
            cadence,
        }
    }

    /// Run until the token is cancelled or the capture handle is released.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let frame = match self.handle.capture() {
                Ok(frame) => frame,
                Err(MediaError::Released) => break,
                Err(err) => {
                    log::error!("frame capture failed: {err}");
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = ticker.tick() => continue,
                    }
                }
            };

            match self.detector.detect(&frame).await {
                Ok(detections) => {
                    METER.tick_inference();
                    // A pass that settles after stop is discarded unrendered.
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    // Zero detections still repaint the plain frame.
                    self.renderer.render(&frame, &detections);
                }
                Err(err) => log::error!("inference failed: {err}"),
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }

        log::debug!("detection loop exited");
    }
}
