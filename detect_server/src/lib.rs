//! Realtime camera detection front-end.
//!
//! Wires a capture device, an external detection service and an annotated
//! MJPEG stream behind start/stop session controls.
pub mod detect_loop;
pub mod detector;
pub mod endpoints;
pub mod media;
pub mod meter;
pub mod renderer;
pub mod sensors;
pub mod session;
pub mod stub;

use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, RgbImage};

/// JPEG-encode a frame for streaming or upload.
pub fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90).encode_image(frame)?;
    Ok(buf)
}

/// Wrap a JPEG buffer as one item of a `multipart/x-mixed-replace` stream.
pub fn as_jpeg_stream_item(data: &[u8]) -> Bytes {
    Bytes::from(
        [
            "--frame\r\nContent-Type: image/jpeg\r\n\r\n".as_bytes(),
            data,
            "\r\n\r\n".as_bytes(),
        ]
        .concat(),
    )
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_stream_item_framing() {
        let item = as_jpeg_stream_item(&[1, 2, 3]);

        assert!(item.starts_with(b"--frame\r\n"));
        assert!(item.ends_with(b"\x01\x02\x03\r\n\r\n"));
    }

    #[test]
    fn test_encoded_jpeg_decodes_to_same_size() -> Result<(), common::Error> {
        let frame = RgbImage::new(32, 16);

        let buf = encode_jpeg(&frame)?;
        let decoded = image::load_from_memory(&buf)?;

        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 16);

        Ok(())
    }
}
