//! V4L2 capture source.
//!
use image::RgbImage;
use rscam::{Camera, Config, IntervalInfo, ResolutionInfo};

use crate::media::{CaptureSource, CaptureStream, MediaError, StreamConstraints};

const CAPTURE_FORMAT: &[u8] = b"MJPG";

/// Capture source backed by a V4L2 device node.
pub struct V4lCaptureSource {
    device: String,
}

impl V4lCaptureSource {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl CaptureSource for V4lCaptureSource {
    fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn CaptureStream>, MediaError> {
        let mut cam = Camera::new(&self.device)
            .map_err(|err| MediaError::Unavailable(format!("{}: {err}", self.device)))?;
        log_supported_formats(&cam);

        let resolution = select_resolution(&cam, CAPTURE_FORMAT, constraints)?;
        let frame_rate = get_max_frame_rate(&cam, CAPTURE_FORMAT, resolution)?;

        cam.start(&Config {
            interval: frame_rate,
            resolution,
            format: CAPTURE_FORMAT,
            ..Default::default()
        })
        .map_err(|err| MediaError::Unavailable(format!("{}: {err}", self.device)))?;

        log::info!(
            "using camera {} at {}x{}, {}/{} fps",
            self.device,
            resolution.0,
            resolution.1,
            frame_rate.1,
            frame_rate.0
        );

        Ok(Box::new(V4lCaptureStream { cam, resolution }))
    }
}

struct V4lCaptureStream {
    cam: Camera,
    resolution: (u32, u32),
}

impl CaptureStream for V4lCaptureStream {
    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn capture(&mut self) -> Result<RgbImage, MediaError> {
        let frame = self
            .cam
            .capture()
            .map_err(|err| MediaError::Capture(err.to_string()))?;
        let image = image::load_from_memory(&frame[..])
            .map_err(|err| MediaError::Capture(format!("JPEG decode: {err}")))?;
        Ok(image.to_rgb8())
    }

    fn stop(&mut self) {
        if let Err(err) = self.cam.stop() {
            log::warn!("error stopping camera: {err}");
        }
    }
}

/// Pick the supported resolution closest to the ideal hint.
fn select_resolution(
    cam: &Camera,
    format: &[u8],
    constraints: &StreamConstraints,
) -> Result<(u32, u32), MediaError> {
    let resolution_info = cam
        .resolutions(format)
        .map_err(|err| MediaError::Unavailable(err.to_string()))?;
    log::debug!("found resolutions: {:?}", &resolution_info);

    let ideal = (constraints.ideal_width, constraints.ideal_height);
    match resolution_info {
        ResolutionInfo::Discretes(resolutions) => nearest_discrete(&resolutions, ideal),
        ResolutionInfo::Stepwise { min, max, step } => Some((
            snap(ideal.0, min.0, max.0, step.0),
            snap(ideal.1, min.1, max.1, step.1),
        )),
    }
    .ok_or_else(|| MediaError::Unavailable("no resolution found".into()))
}

/// Supported mode with the smallest pixel-count distance to the ideal hint.
fn nearest_discrete(resolutions: &[(u32, u32)], ideal: (u32, u32)) -> Option<(u32, u32)> {
    let ideal_pixels = i64::from(ideal.0) * i64::from(ideal.1);
    resolutions
        .iter()
        .min_by_key(|res| (i64::from(res.0) * i64::from(res.1) - ideal_pixels).abs())
        .copied()
}

/// Clamp a hint into a stepwise mode range, snapping down onto the grid.
fn snap(ideal: u32, min: u32, max: u32, step: u32) -> u32 {
    let clamped = ideal.clamp(min, max);
    match step {
        0 => clamped,
        step => min + ((clamped - min) / step) * step,
    }
}

/// Get the maximum supported frame rate for the given format and resolution.
fn get_max_frame_rate(
    cam: &Camera,
    format: &[u8],
    resolution: (u32, u32),
) -> Result<(u32, u32), MediaError> {
    let interval_info = cam
        .intervals(format, resolution)
        .map_err(|err| MediaError::Unavailable(err.to_string()))?;
    log::debug!("found frame rates: {:?}", &interval_info);

    match interval_info {
        IntervalInfo::Discretes(frame_rates) => frame_rates
            .iter()
            // Map discrete values to real frame rate
            .map(|&(denominator, numerator)| ((denominator, numerator), numerator / denominator))
            // Get the highest frame rate
            .max_by(|a, b| a.1.cmp(&b.1))
            // Extract denominator and numerator
            .map(|(rate, _)| rate),
        IntervalInfo::Stepwise {
            min: _,
            max,
            step: _,
        } => Some(max),
    }
    .ok_or_else(|| MediaError::Unavailable("no frame rate found".into()))
}

fn log_supported_formats(cam: &Camera) {
    let formats: Vec<_> = cam.formats().filter_map(|fmt| fmt.ok()).collect();
    log::debug!("supported formats: {formats:?}");
}
