//! Frame renderer: the captured frame plus detection overlays.
//!
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use common::types::{BoundingBox, Detection};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::meter::METER;
use crate::{as_jpeg_stream_item, encode_jpeg};

/// Box outline and tag fill color.
const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Label text color.
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const OUTLINE_THICKNESS: i32 = 3;
const TAG_HEIGHT: u32 = 25;
const TAG_PAD: i32 = 5;
const LABEL_SCALE: f32 = 16.0;

/// Locations probed for a label font when none is configured.
const FONT_SEARCH_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/liberation2/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no usable label font found in {0} known locations; pass one with --font")]
    NoFont(usize),
    #[error("could not load label font from {path}: {reason}")]
    BadFont { path: PathBuf, reason: String },
}

/// Load the label font from an explicit path or from well-known system
/// locations.
pub fn load_label_font(path: Option<&Path>) -> Result<Font<'static>, RenderError> {
    match path {
        Some(path) => load_font_file(path),
        None => FONT_SEARCH_PATHS
            .iter()
            .map(Path::new)
            .filter(|candidate| candidate.exists())
            .find_map(|candidate| load_font_file(candidate).ok())
            .ok_or(RenderError::NoFont(FONT_SEARCH_PATHS.len())),
    }
}

fn load_font_file(path: &Path) -> Result<Font<'static>, RenderError> {
    let data = std::fs::read(path).map_err(|err| RenderError::BadFont {
        path: path.into(),
        reason: err.to_string(),
    })?;
    Font::try_from_vec(data).ok_or_else(|| RenderError::BadFont {
        path: path.into(),
        reason: "not a valid font".into(),
    })
}

/// Drawing surface the renderer presents finished frames to.
pub trait Surface: Send + Sync {
    /// Show a finished frame.
    fn present(&self, frame: &RgbImage);

    /// Blank the surface.
    fn clear(&self);
}

/// Surface that broadcasts presented frames as MJPEG stream items.
pub struct StreamSurface {
    tx: broadcast::Sender<Bytes>,
    last_size: Mutex<Option<(u32, u32)>>,
}

impl StreamSurface {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(20);
        Self {
            tx,
            last_size: Mutex::new(None),
        }
    }

    /// Subscribe to the annotated frame stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.tx.subscribe()
    }

    fn send(&self, frame: &RgbImage) {
        match encode_jpeg(frame) {
            Ok(buf) => {
                METER.tick_presented();
                if self.tx.send(as_jpeg_stream_item(&buf)).is_err() {
                    log::debug!("no stream subscriber - frame dropped");
                }
            }
            Err(err) => log::error!("could not encode frame: {err}"),
        }
    }
}

impl Default for StreamSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for StreamSurface {
    fn present(&self, frame: &RgbImage) {
        *self.last_size.lock().unwrap() = Some(frame.dimensions());
        self.send(frame);
    }

    fn clear(&self) {
        let last_size = *self.last_size.lock().unwrap();
        if let Some((width, height)) = last_size {
            self.send(&RgbImage::new(width, height));
        }
    }
}

/// Sink for finished detection passes.
///
/// The detection loop talks to this seam; `FrameRenderer` is the production
/// implementation.
pub trait RenderSink: Send + Sync {
    /// Draw the frame with its detections.
    fn render(&self, frame: &RgbImage, detections: &[Detection]);

    /// Blank the output.
    fn clear(&self);
}

/// Draws frames with detection overlays onto a surface.
pub struct FrameRenderer {
    font: Font<'static>,
    surface: Arc<dyn Surface>,
}

impl FrameRenderer {
    pub fn new(font: Font<'static>, surface: Arc<dyn Surface>) -> Self {
        Self { font, surface }
    }

    /// Draw the frame, then each detection in order, and present the result.
    ///
    /// The frame is always drawn, so a pass with no detections erases any
    /// previous overlay. Overlapping detections draw over earlier ones in
    /// input order.
    pub fn render(&self, frame: &RgbImage, detections: &[Detection]) {
        let mut canvas = frame.clone();
        for detection in detections {
            self.draw_detection(&mut canvas, detection);
        }
        self.surface.present(&canvas);
    }

    /// Blank the surface.
    pub fn clear(&self) {
        self.surface.clear();
    }

    fn draw_detection(&self, canvas: &mut RgbImage, detection: &Detection) {
        for rect in outline_rects(&detection.bounding_box) {
            draw_hollow_rect_mut(canvas, rect, OVERLAY_COLOR);
        }

        let text = label_tag(detection);
        let scale = Scale {
            x: LABEL_SCALE,
            y: LABEL_SCALE,
        };
        let (text_width, _) = text_size(scale, &self.font, &text);
        let tag = tag_rect(&detection.bounding_box, text_width);
        draw_filled_rect_mut(canvas, tag, OVERLAY_COLOR);
        draw_text_mut(
            canvas,
            TEXT_COLOR,
            tag.left() + TAG_PAD,
            tag.top() + (TAG_HEIGHT as i32 - LABEL_SCALE as i32) / 2,
            scale,
            &self.font,
            &text,
        );
    }
}

impl RenderSink for FrameRenderer {
    fn render(&self, frame: &RgbImage, detections: &[Detection]) {
        FrameRenderer::render(self, frame, detections);
    }

    fn clear(&self) {
        FrameRenderer::clear(self);
    }
}

/// Label tag text: `"<label> <confidence.1>%"`.
pub fn label_tag(detection: &Detection) -> String {
    format!("{} {:.1}%", detection.label, detection.confidence * 100.0)
}

/// Concentric rectangles approximating a thick outline. Boxes too small for
/// an inner ring simply get fewer rings.
fn outline_rects(bbox: &BoundingBox) -> Vec<Rect> {
    let (x, y) = (bbox.x.round() as i32, bbox.y.round() as i32);
    let (width, height) = (bbox.width.round() as i32, bbox.height.round() as i32);

    (0..OUTLINE_THICKNESS)
        .filter_map(|inset| {
            let width = width - 2 * inset;
            let height = height - 2 * inset;
            match width > 0 && height > 0 {
                true => Some(Rect::at(x + inset, y + inset).of_size(width as u32, height as u32)),
                false => None,
            }
        })
        .collect()
}

/// Filled tag immediately above the box. A tag that extends past the frame
/// edge clips like any other drawing.
fn tag_rect(bbox: &BoundingBox, text_width: i32) -> Rect {
    let x = bbox.x.round() as i32;
    let y = bbox.y.round() as i32;
    Rect::at(x, y - TAG_HEIGHT as i32).of_size((text_width + 2 * TAG_PAD).max(1) as u32, TAG_HEIGHT)
}
