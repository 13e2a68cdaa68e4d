//! External classifier contract and its awaitable wrapper.
//!
use common::types::{Classification, InferError};
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use reqwest::{header::CONTENT_TYPE, Client};
use tokio::sync::oneshot;

/// Callback receiving the ordered classifications or an error.
pub type ClassifyCallback = Box<dyn FnOnce(Result<Vec<Classification>, InferError>) + Send>;

/// Callback-style contract of the external classifier.
///
/// `done` is invoked exactly once with the candidates in the classifier's
/// order, best first.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: RgbImage, done: ClassifyCallback);
}

/// Await a callback-style classification as a single result.
pub async fn classify(
    classifier: &dyn Classifier,
    image: RgbImage,
) -> Result<Vec<Classification>, InferError> {
    let (tx, rx) = oneshot::channel();
    classifier.classify(
        image,
        Box::new(move |outcome| {
            tx.send(outcome).ok();
        }),
    );

    match rx.await {
        Ok(outcome) => outcome,
        Err(_) => Err(InferError::Backend("classifier dropped its callback".into())),
    }
}

/// Summary line for the best candidate, confidence to four decimals.
pub fn summarize(results: &[Classification]) -> String {
    match results.first() {
        Some(top) => format!("result: {}, confidence: {:.4}", top.label, top.confidence),
        None => "no classification returned".to_string(),
    }
}

/// Classifier backed by a remote classification service.
///
/// POSTs the JPEG-encoded image and invokes the callback from a spawned
/// task once the service answered.
pub struct RemoteClassifier {
    client: Client,
    endpoint: String,
}

impl RemoteClassifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Classifier for RemoteClassifier {
    fn classify(&self, image: RgbImage, done: ClassifyCallback) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            done(classify_remote(&client, &endpoint, &image).await);
        });
    }
}

async fn classify_remote(
    client: &Client,
    endpoint: &str,
    image: &RgbImage,
) -> Result<Vec<Classification>, InferError> {
    let jpeg =
        encode_jpeg(image).map_err(|err| InferError::Backend(format!("JPEG encode: {err}")))?;

    let response = client
        .post(endpoint)
        .header(CONTENT_TYPE, "image/jpeg")
        .body(jpeg)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(InferError::Backend(format!(
            "classifier responded with status {status}"
        )));
    }

    response
        .json()
        .await
        .map_err(|err| InferError::Malformed(err.to_string()))
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90).encode_image(image)?;
    Ok(buf)
}

/// Scriptable classifier for tests and `--classifier stub` demo runs.
pub struct StubClassifier {
    results: Vec<Classification>,
    fail: bool,
}

impl StubClassifier {
    pub fn new(results: Vec<Classification>) -> Self {
        Self {
            results,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            results: Vec::new(),
            fail: true,
        }
    }
}

impl Classifier for StubClassifier {
    fn classify(&self, _image: RgbImage, done: ClassifyCallback) {
        match self.fail {
            true => done(Err(InferError::Backend("stub classifier failure".into()))),
            false => done(Ok(self.results.clone())),
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    fn candidates() -> Vec<Classification> {
        vec![
            Classification {
                label: "tabby".to_string(),
                confidence: 0.9234,
            },
            Classification {
                label: "tiger cat".to_string(),
                confidence: 0.0412,
            },
        ]
    }

    #[tokio::test]
    async fn test_wrapper_resolves_callback_success_in_order() {
        let classifier = StubClassifier::new(candidates());

        let results = classify(&classifier, RgbImage::new(4, 4)).await.unwrap();

        assert_eq!(results, candidates());
    }

    #[tokio::test]
    async fn test_wrapper_resolves_callback_failure() {
        let classifier = StubClassifier::failing();

        let result = classify(&classifier, RgbImage::new(4, 4)).await;

        assert!(matches!(result, Err(InferError::Backend(_))));
    }

    #[test]
    fn test_summarize_formats_four_decimals() {
        assert_eq!(
            summarize(&candidates()),
            "result: tabby, confidence: 0.9234"
        );
        assert_eq!(summarize(&[]), "no classification returned");
    }
}
