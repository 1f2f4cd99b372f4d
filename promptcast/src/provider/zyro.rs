//! Zyro AI image upscaler.
//!
//! # Request
//!
//! `POST {url}` with body `{"image_data": "data:image/jpeg;base64,<payload>"}`.
//!
//! # Response
//!
//! `{"upscaled": "data:image/<format>;base64,<payload>"}`. The data-URL
//! header is stripped so only the base64 payload moves on.

use crate::pipeline::{ImagePayload, ImageUpscaler, UpscaleError};
use crate::provider::AsyncHttpClient;
use serde::{Deserialize, Serialize};

/// Default upscaling endpoint.
pub const ZYRO_DEFAULT_URL: &str = "https://upscaler.zyro.com/v1/ai/image-upscaler";

/// Data-URL header sent with every request.
const REQUEST_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Serialize)]
struct UpscaleBody {
    image_data: String,
}

#[derive(Deserialize)]
struct UpscaleResponse {
    upscaled: String,
}

/// Extracts the base64 payload from a `data:` URL.
///
/// Returns `None` unless the value is a base64 data URL.
pub fn strip_data_url(value: &str) -> Option<&str> {
    let (header, payload) = value.split_once(',')?;
    if header.starts_with("data:") && header.ends_with(";base64") {
        Some(payload)
    } else {
        None
    }
}

/// Upscaling adapter for the Zyro HTTP API.
pub struct ZyroUpscaler<C: AsyncHttpClient> {
    http_client: C,
    url: String,
}

impl<C: AsyncHttpClient> ZyroUpscaler<C> {
    /// Creates an upscaler targeting the public endpoint.
    pub fn new(http_client: C) -> Self {
        Self::with_url(http_client, ZYRO_DEFAULT_URL)
    }

    /// Creates an upscaler targeting a custom endpoint.
    pub fn with_url(http_client: C, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl<C: AsyncHttpClient> ImageUpscaler for ZyroUpscaler<C> {
    async fn upscale(&self, image: &ImagePayload) -> Result<ImagePayload, UpscaleError> {
        let body = serde_json::to_string(&UpscaleBody {
            image_data: format!("{}{}", REQUEST_DATA_URL_PREFIX, image.as_str()),
        })
        .map_err(|e| UpscaleError::InvalidResponse(format!("request encoding: {}", e)))?;

        let bytes = self.http_client.post_json(&self.url, &body, &[]).await?;

        let response: UpscaleResponse = serde_json::from_slice(&bytes)
            .map_err(|e| UpscaleError::InvalidResponse(e.to_string()))?;

        let payload = strip_data_url(&response.upscaled).ok_or_else(|| {
            UpscaleError::InvalidResponse("'upscaled' is not a base64 data URL".to_string())
        })?;
        if payload.is_empty() {
            return Err(UpscaleError::InvalidResponse(
                "'upscaled' carries an empty payload".to_string(),
            ));
        }

        Ok(ImagePayload::from(payload))
    }

    fn name(&self) -> &str {
        "zyro"
    }
}
