//! HTTP endpoints of the detection front-end.
//!
use std::sync::Arc;

use axum::{
    body::StreamBody,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Extension, Json,
};
use futures::StreamExt;
use serde::Serialize;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::renderer::StreamSurface;
use crate::session::{SessionController, SessionError};

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Realtime Detection</title></head>
<body>
  <div class="controls">
    <button id="toggle" disabled>Start</button>
  </div>
  <div class="view" style="margin: 0 auto; max-width: 960px;">
    <img src="./stream" style="width: 100%;">
  </div>
  <p id="status"></p>
  <script>
    const button = document.querySelector('#toggle');
    const status = document.querySelector('#status');

    async function refresh() {
      const current = await (await fetch('./status')).json();
      status.innerText = current.message;
      button.innerText = current.state === 'detecting' ? 'Stop' : 'Start';
    }

    button.onclick = async () => {
      button.disabled = true;
      const action = button.innerText === 'Stop' ? './stop' : './start';
      await fetch(action, { method: 'POST' });
      await refresh();
      button.disabled = false;
    };

    setInterval(refresh, 1000);
    refresh().then(() => { button.disabled = false; });
  </script>
</body>
</html>
"#;

/// Minimal viewer page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: String,
    pub message: String,
}

/// Session state and status text.
pub async fn session_status(
    Extension(controller): Extension<Arc<SessionController>>,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        state: controller.state().to_string(),
        message: controller.status_text(),
    })
}

/// Start the detection session.
pub async fn start_session(
    Extension(controller): Extension<Arc<SessionController>>,
) -> Result<&'static str, (StatusCode, String)> {
    controller.start().await.map_err(error_response)?;
    Ok("detecting")
}

/// Stop the detection session.
pub async fn stop_session(
    Extension(controller): Extension<Arc<SessionController>>,
) -> Result<&'static str, (StatusCode, String)> {
    controller.stop().await.map_err(error_response)?;
    Ok("stopped")
}

/// Stream of annotated frames.
pub async fn annotated_stream(
    Extension(surface): Extension<Arc<StreamSurface>>,
) -> impl IntoResponse {
    log::info!("stream subscriber connected");

    let stream = BroadcastStream::new(surface.subscribe()).filter_map(|item| async move {
        match item {
            Ok(chunk) => Some(Ok::<_, String>(chunk)),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                log::debug!("stream subscriber lagging, {skipped} frames dropped");
                None
            }
        }
    });

    // Set body and headers for multipart streaming
    let body = StreamBody::new(stream);
    let headers = [(
        header::CONTENT_TYPE,
        "multipart/x-mixed-replace; boundary=frame",
    )];

    (headers, body)
}

fn error_response(err: SessionError) -> (StatusCode, String) {
    let status = match &err {
        SessionError::Busy | SessionError::AlreadyRunning | SessionError::NotRunning => {
            StatusCode::CONFLICT
        }
        SessionError::Media(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, err.to_string())
}
