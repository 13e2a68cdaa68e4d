//! Generic JSON call helper.
//!
//! Thin passthrough to the inference services' HTTP APIs: GET when there is
//! no body, POST with a JSON body otherwise. Not used on the hot path of the
//! realtime loop.
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure of an API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("api-bad-status: {0}")]
    BadStatus(u16),
    #[error("api request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Call `endpoint` with the given query parameters and optional JSON body.
///
/// Sends a GET request when `body` is `None` and a POST with the JSON body
/// otherwise. Responds with the parsed JSON body, or `ApiError::BadStatus`
/// when the response status is not OK.
pub async fn call<T: DeserializeOwned>(
    client: &Client,
    endpoint: &str,
    queries: &[(&str, &str)],
    body: Option<&serde_json::Value>,
) -> Result<T, ApiError> {
    let request = match body {
        None => client.get(endpoint),
        Some(body) => client.post(endpoint).json(body),
    };

    let response = request.query(queries).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::BadStatus(status.as_u16()));
    }

    Ok(response.json().await?)
}
