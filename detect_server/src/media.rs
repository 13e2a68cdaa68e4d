//! Media session: acquisition and release of capture streams.
//!
use std::sync::{Arc, Mutex};

use image::RgbImage;
use thiserror::Error;

/// Failure of the capture device layer.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Permission denied or no matching device.
    #[error("no capture device available: {0}")]
    Unavailable(String),
    /// The handle was already released.
    #[error("capture stream released")]
    Released,
    /// The device failed to deliver a frame.
    #[error("frame capture failed: {0}")]
    Capture(String),
}

/// Resolution hints used when acquiring a capture stream.
///
/// Hints, not requirements: the source picks the supported mode closest to
/// them.
#[derive(Clone, Copy, Debug)]
pub struct StreamConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 720,
            ideal_height: 480,
        }
    }
}

/// A capture device that can open streams.
pub trait CaptureSource: Send + Sync {
    fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn CaptureStream>, MediaError>;
}

/// One live capture stream.
pub trait CaptureStream: Send {
    /// Negotiated resolution.
    fn resolution(&self) -> (u32, u32);

    /// Capture the freshest frame.
    fn capture(&mut self) -> Result<RgbImage, MediaError>;

    /// Stop the underlying device.
    fn stop(&mut self);
}

/// Exclusively-owned handle over one active capture stream.
///
/// Clones share the stream; releasing any clone stops the device for all of
/// them.
#[derive(Clone)]
pub struct MediaHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    stream: Mutex<Option<Box<dyn CaptureStream>>>,
    resolution: (u32, u32),
}

impl MediaHandle {
    fn new(stream: Box<dyn CaptureStream>) -> Self {
        let resolution = stream.resolution();
        Self {
            inner: Arc::new(HandleInner {
                stream: Mutex::new(Some(stream)),
                resolution,
            }),
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.inner.resolution
    }

    /// Number of live tracks: 1 while the stream is open, 0 after release.
    pub fn active_tracks(&self) -> usize {
        match self.inner.stream.lock().unwrap().is_some() {
            true => 1,
            false => 0,
        }
    }

    /// Capture the freshest frame, or fail `Released` after release.
    pub fn capture(&self) -> Result<RgbImage, MediaError> {
        match self.inner.stream.lock().unwrap().as_mut() {
            Some(stream) => stream.capture(),
            None => Err(MediaError::Released),
        }
    }

    /// Stop every track. Safe to call when already released.
    pub fn release(&self) {
        if let Some(mut stream) = self.inner.stream.lock().unwrap().take() {
            stream.stop();
        }
    }
}

/// Acquires and releases capture streams on behalf of the session
/// controller.
pub struct MediaSession {
    source: Arc<dyn CaptureSource>,
}

impl MediaSession {
    pub fn new(source: Arc<dyn CaptureSource>) -> Self {
        Self { source }
    }

    /// Open a capture stream matching the constraints.
    pub fn acquire(&self, constraints: &StreamConstraints) -> Result<MediaHandle, MediaError> {
        let stream = self.source.open(constraints)?;
        let (width, height) = stream.resolution();
        log::info!("capture stream acquired at {width}x{height}");
        Ok(MediaHandle::new(stream))
    }

    /// Stop every track of the handle. Idempotent.
    pub fn release(&self, handle: &MediaHandle) {
        handle.release();
    }
}
