//! Stub capture source and detector, for tests and `--device stub` /
//! `--detector stub` demo runs.
//!
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use common::types::{Detection, InferError};
use futures::future::BoxFuture;
use image::{Rgb, RgbImage};

use crate::detector::Detector;
use crate::media::{CaptureSource, CaptureStream, MediaError, StreamConstraints};

/// Synthetic capture source.
///
/// Produces flat frames with a moving stripe so consecutive captures differ.
pub struct StubCaptureSource {
    deny: AtomicBool,
}

impl StubCaptureSource {
    pub fn new() -> Self {
        Self {
            deny: AtomicBool::new(false),
        }
    }

    /// Make the next `open` fail like a denied permission prompt.
    pub fn deny_next(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }
}

impl Default for StubCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for StubCaptureSource {
    fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn CaptureStream>, MediaError> {
        if self.deny.swap(false, Ordering::SeqCst) {
            return Err(MediaError::Unavailable("denied by stub".into()));
        }

        Ok(Box::new(StubStream {
            resolution: (constraints.ideal_width, constraints.ideal_height),
            counter: 0,
        }))
    }
}

struct StubStream {
    resolution: (u32, u32),
    counter: u32,
}

impl CaptureStream for StubStream {
    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn capture(&mut self) -> Result<RgbImage, MediaError> {
        let (width, height) = self.resolution;
        let stripe = self.counter % width.max(1);
        self.counter = self.counter.wrapping_add(1);

        Ok(RgbImage::from_fn(width, height, |x, _| match x == stripe {
            true => Rgb([255, 255, 255]),
            false => Rgb([32, 32, 32]),
        }))
    }

    fn stop(&mut self) {}
}

/// Scriptable detector with call instrumentation.
pub struct StubDetector {
    detections: Vec<Detection>,
    delay: Duration,
    fail_on_calls: Vec<usize>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            delay: Duration::ZERO,
            fail_on_calls: Vec::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay each pass, emulating slow inference.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the given passes (1-based call numbers) with a backend error.
    pub fn fail_on_calls(mut self, calls: Vec<usize>) -> Self {
        self.fail_on_calls = calls;
        self
    }

    /// Total number of detect calls observed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrently running detect calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Detector for StubDetector {
    fn detect<'a>(
        &'a self,
        _frame: &'a RgbImage,
    ) -> BoxFuture<'a, Result<Vec<Detection>, InferError>> {
        Box::pin(async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.fail_on_calls.contains(&call) {
                true => Err(InferError::Backend(format!("stub failure on call {call}"))),
                false => Ok(self.detections.clone()),
            }
        })
    }
}
