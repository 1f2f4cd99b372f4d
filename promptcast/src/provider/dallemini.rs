//! DALL·E Mini image generation service.
//!
//! # Request
//!
//! `POST {url}` with body `{"prompt": "<description>"}`.
//!
//! # Response
//!
//! `{"images": ["<base64>", ...]}`. The service usually returns several
//! images per prompt; every one of them enters the pipeline.

use crate::pipeline::{GenerationError, ImageGenerator, ImagePayload};
use crate::provider::AsyncHttpClient;
use serde::{Deserialize, Serialize};

/// Default generation endpoint.
pub const DALLEMINI_DEFAULT_URL: &str = "https://bf.dallemini.ai/generate";

#[derive(Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    images: Vec<String>,
}

/// Generation adapter for the DALL·E Mini HTTP API.
///
/// # Example
///
/// ```ignore
/// use promptcast::provider::{AsyncReqwestClient, DalleMiniGenerator};
///
/// let client = AsyncReqwestClient::new()?;
/// let generator = DalleMiniGenerator::new(client);
/// let images = generator.generate("cat, in space").await?;
/// ```
pub struct DalleMiniGenerator<C: AsyncHttpClient> {
    http_client: C,
    url: String,
}

impl<C: AsyncHttpClient> DalleMiniGenerator<C> {
    /// Creates a generator targeting the public endpoint.
    pub fn new(http_client: C) -> Self {
        Self::with_url(http_client, DALLEMINI_DEFAULT_URL)
    }

    /// Creates a generator targeting a custom endpoint.
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

impl<C: AsyncHttpClient> ImageGenerator for DalleMiniGenerator<C> {
    async fn generate(&self, description: &str) -> Result<Vec<ImagePayload>, GenerationError> {
        let body = serde_json::to_string(&GenerateBody {
            prompt: description,
        })
        .map_err(|e| GenerationError::InvalidResponse(format!("request encoding: {}", e)))?;

        let bytes = self
            .http_client
            .post_json(&self.url, &body, &[("Accept", "application/json")])
            .await?;

        let response: GenerateResponse = serde_json::from_slice(&bytes)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        Ok(response.images.into_iter().map(ImagePayload::from).collect())
    }

    fn name(&self) -> &str {
        "dallemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests::MockAsyncHttpClient;
    use crate::provider::ProviderError;

    #[tokio::test]
    async fn test_generate_parses_images() {
        let mock = MockAsyncHttpClient::responding(r#"{"images": ["aaa", "bbb"], "version": "x"}"#);
        let generator = DalleMiniGenerator::new(mock.clone());

        let images = generator.generate("cat, in space").await.unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].as_str(), "aaa");
        assert_eq!(images[1].as_str(), "bbb");
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_body() {
        let mock = MockAsyncHttpClient::responding(r#"{"images": []}"#);
        let generator = DalleMiniGenerator::with_url(mock.clone(), "http://localhost/gen");

        generator.generate("cat, \"quoted\"").await.unwrap();

        let recorded = mock.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].url, "http://localhost/gen");
        let body: serde_json::Value = serde_json::from_str(&recorded[0].body).unwrap();
        assert_eq!(body["prompt"], "cat, \"quoted\"");
    }

    #[tokio::test]
    async fn test_generate_missing_images_field() {
        let mock = MockAsyncHttpClient::responding(r#"{"error": "overloaded"}"#);
        let generator = DalleMiniGenerator::new(mock);

        let result = generator.generate("cat").await;

        assert!(matches!(result, Err(GenerationError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_generate_transport_error() {
        let mock = MockAsyncHttpClient::failing(ProviderError::Status {
            status: 503,
            url: DALLEMINI_DEFAULT_URL.to_string(),
        });
        let generator = DalleMiniGenerator::new(mock);

        let result = generator.generate("cat").await;

        match result {
            Err(GenerationError::Provider(ProviderError::Status { status, .. })) => {
                assert_eq!(status, 503)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
