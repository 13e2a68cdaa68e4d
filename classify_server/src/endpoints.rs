//! HTTP endpoints of the recognition front-end.
//!
use std::sync::Arc;

use axum::{extract::Multipart, http::StatusCode, response::Html, Extension, Json};
use common::types::Classification;
use serde::Serialize;

use crate::classifier::{classify, summarize, Classifier};
use crate::preview::preview_dimensions;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Object Recognition</title></head>
<body>
  <div class="upload">
    <input type="file" id="file" accept="image/*">
    <input type="button" id="load" value="Classify">
  </div>
  <div class="preview"><img id="preview" style="display: none;"></div>
  <div class="results"><p id="results">Choose an image file to classify</p></div>
  <script>
    const fileInput = document.querySelector('#file');
    const button = document.querySelector('#load');
    const preview = document.querySelector('#preview');
    const results = document.querySelector('#results');

    button.onclick = async () => {
      const file = fileInput.files[0];
      if (!file || !file.type.match('image.*')) return;

      results.innerText = 'processing...';

      const body = new FormData();
      body.append('file', file);

      const response = await fetch('./classify', { method: 'POST', body });
      if (!response.ok) {
        results.innerText = 'classification failed (' + response.status + ')';
        return;
      }

      const outcome = await response.json();
      preview.src = URL.createObjectURL(file);
      preview.width = outcome.preview_width;
      preview.height = outcome.preview_height;
      preview.style.display = 'block';
      results.innerText = outcome.summary;
    };
  </script>
</body>
</html>
"#;

/// Minimal upload page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub results: Vec<Classification>,
    pub summary: String,
    pub preview_width: u32,
    pub preview_height: u32,
}

/// Classify an uploaded image.
///
/// Takes the first multipart field carrying an `image/*` content type;
/// other fields are skipped.
pub async fn classify_upload(
    Extension(classifier): Extension<Arc<dyn Classifier>>,
    mut multipart: Multipart,
) -> Result<Json<ClassifyResponse>, (StatusCode, String)> {
    let field = loop {
        match multipart.next_field().await {
            Err(err) => {
                return Err((StatusCode::BAD_REQUEST, format!("malformed upload: {err}")))
            }
            Ok(None) => return Err((StatusCode::BAD_REQUEST, "no image in upload".to_string())),
            Ok(Some(field)) => {
                let is_image = field
                    .content_type()
                    .map(|content_type| content_type.starts_with("image/"))
                    .unwrap_or(false);
                if is_image {
                    break field;
                }
            }
        }
    };

    let data = field.bytes().await.map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            format!("could not read upload: {err}"),
        )
    })?;

    let image = image::load_from_memory(&data)
        .map_err(|err| {
            (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!("not a decodable image: {err}"),
            )
        })?
        .to_rgb8();
    let (width, height) = image.dimensions();

    let results = classify(classifier.as_ref(), image).await.map_err(|err| {
        log::error!("classification failed: {err}");
        (
            StatusCode::BAD_GATEWAY,
            format!("classification failed: {err}"),
        )
    })?;

    let (preview_width, preview_height) = preview_dimensions(width, height);

    Ok(Json(ClassifyResponse {
        summary: summarize(&results),
        results,
        preview_width,
        preview_height,
    }))
}
