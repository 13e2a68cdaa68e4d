//! Result types shared by the detection and classification front-ends.
//!
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounding box in pixel coordinates of the source frame.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One detected object.
///
/// Detections arrive as an ordered sequence per frame, zero or more, in the
/// order the detector returned them. No priority is implied and nothing is
/// merged or suppressed on this side.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Detection {
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bounding_box: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bounding_box,
        }
    }
}

/// One classification candidate for a static image, best first.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Classification {
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Failure of a detector or classifier call.
///
/// These are logged and swallowed inside the realtime loop; only the upload
/// path of the classification front-end surfaces them to the caller.
#[derive(Debug, Error)]
pub enum InferError {
    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed inference response: {0}")]
    Malformed(String),
    #[error("inference backend failed: {0}")]
    Backend(String),
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::Error;

    #[test]
    fn test_detection_wire_format() -> Result<(), Error> {
        let detection = Detection::new(
            "cat",
            0.92,
            BoundingBox {
                x: 10.0,
                y: 10.0,
                width: 50.0,
                height: 50.0,
            },
        );

        let serialized = serde_json::to_string(&detection)?;
        let deserialized: Detection = serde_json::from_str(&serialized)?;

        assert_eq!(detection, deserialized);

        Ok(())
    }

    #[test]
    fn test_detection_parses_service_json() -> Result<(), Error> {
        let body = r#"{
            "label": "dog",
            "confidence": 0.81,
            "bounding_box": { "x": 60.0, "y": 10.0, "width": 40.0, "height": 40.0 }
        }"#;

        let detection: Detection = serde_json::from_str(body)?;

        assert_eq!(detection.label, "dog");
        assert_eq!(detection.bounding_box.width, 40.0);

        Ok(())
    }
}
