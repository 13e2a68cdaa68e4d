use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use classify_server::classifier::{Classifier, StubClassifier};
use classify_server::endpoints::{classify_upload, healthcheck, index};
use common::types::Classification;
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use reqwest::multipart::{Form, Part};

fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode_image(&RgbImage::new(width, height))
        .expect("encode sample image");
    buf
}

fn spawn_front_end(classifier: Arc<dyn Classifier>) -> Result<String, common::Error> {
    let app = Router::new()
        .route("/", get(index))
        .route("/healthcheck", get(healthcheck))
        .route("/classify", post(classify_upload))
        .layer(Extension(classifier));

    let server = axum::Server::bind(&"127.0.0.1:0".parse()?).serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);

    Ok(format!("http://{addr}"))
}

async fn post_upload(base: &str, part: Part) -> Result<reqwest::Response, common::Error> {
    let response = reqwest::Client::new()
        .post(format!("{base}/classify"))
        .multipart(Form::new().part("file", part))
        .send()
        .await?;
    Ok(response)
}

#[tokio::test]
async fn test_upload_classify_round_trip() -> Result<(), common::Error> {
    let classifier = Arc::new(StubClassifier::new(vec![
        Classification {
            label: "tabby".to_string(),
            confidence: 0.9234,
        },
        Classification {
            label: "tiger cat".to_string(),
            confidence: 0.0412,
        },
    ]));
    let base = spawn_front_end(classifier)?;

    let part = Part::bytes(sample_jpeg(800, 400))
        .file_name("cat.jpg")
        .mime_str("image/jpeg")?;
    let response = post_upload(&base, part).await?;

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["summary"], "result: tabby, confidence: 0.9234");
    assert_eq!(body["results"][0]["label"], "tabby");
    assert_eq!(body["results"][1]["label"], "tiger cat");
    assert_eq!(body["preview_width"], 400);
    assert_eq!(body["preview_height"], 200);

    Ok(())
}

#[tokio::test]
async fn test_non_image_upload_is_rejected() -> Result<(), common::Error> {
    let base = spawn_front_end(Arc::new(StubClassifier::new(vec![])))?;

    let part = Part::text("not a picture")
        .file_name("notes.txt")
        .mime_str("text/plain")?;
    let response = post_upload(&base, part).await?;

    assert_eq!(response.status().as_u16(), 400);

    Ok(())
}

#[tokio::test]
async fn test_undecodable_image_is_rejected() -> Result<(), common::Error> {
    let base = spawn_front_end(Arc::new(StubClassifier::new(vec![])))?;

    let part = Part::bytes(vec![1, 2, 3])
        .file_name("broken.jpg")
        .mime_str("image/jpeg")?;
    let response = post_upload(&base, part).await?;

    assert_eq!(response.status().as_u16(), 415);

    Ok(())
}

#[tokio::test]
async fn test_failing_classifier_maps_to_bad_gateway() -> Result<(), common::Error> {
    let base = spawn_front_end(Arc::new(StubClassifier::failing()))?;

    let part = Part::bytes(sample_jpeg(32, 32))
        .file_name("cat.jpg")
        .mime_str("image/jpeg")?;
    let response = post_upload(&base, part).await?;

    assert_eq!(response.status().as_u16(), 502);

    Ok(())
}
