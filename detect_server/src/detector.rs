//! External detector contract.
//!
use common::types::{Detection, InferError};
use futures::future::BoxFuture;
use image::RgbImage;
use reqwest::{header::CONTENT_TYPE, Client};

use crate::encode_jpeg;

/// External detection service: one inference pass per call.
///
/// A pass may be slow; callers await the previous pass before scheduling the
/// next one, so implementations never see overlapping calls from the same
/// session.
pub trait Detector: Send + Sync {
    fn detect<'a>(
        &'a self,
        frame: &'a RgbImage,
    ) -> BoxFuture<'a, Result<Vec<Detection>, InferError>>;
}

/// Detector backed by a remote inference service.
///
/// POSTs the JPEG-encoded frame and expects the ordered detections as a JSON
/// array.
pub struct RemoteDetector {
    client: Client,
    endpoint: String,
}

impl RemoteDetector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Detector for RemoteDetector {
    fn detect<'a>(
        &'a self,
        frame: &'a RgbImage,
    ) -> BoxFuture<'a, Result<Vec<Detection>, InferError>> {
        Box::pin(async move {
            let jpeg = encode_jpeg(frame)
                .map_err(|err| InferError::Backend(format!("JPEG encode: {err}")))?;

            let response = self
                .client
                .post(&self.endpoint)
                .header(CONTENT_TYPE, "image/jpeg")
                .body(jpeg)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(InferError::Backend(format!(
                    "detector responded with status {status}"
                )));
            }

            response
                .json()
                .await
                .map_err(|err| InferError::Malformed(err.to_string()))
        })
    }
}
