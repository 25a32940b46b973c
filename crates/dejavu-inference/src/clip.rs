//! CLIP-style embedding server backend.
//!
//! Images and text are embedded by the same model into one space, so a text
//! query can be compared directly against stored photo and keyframe vectors.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use dejavu_core::defaults::{CLIP_MODEL, CLIP_URL, EMBED_DIMENSION, EMBED_TIMEOUT_SECS};
use dejavu_core::{Error, MediaEmbedder, Result, Vector};

/// Connection settings for the embedding server.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout: Duration,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            base_url: CLIP_URL.to_string(),
            model: CLIP_MODEL.to_string(),
            dimension: EMBED_DIMENSION,
            timeout: Duration::from_secs(EMBED_TIMEOUT_SECS),
        }
    }
}

impl ClipConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `CLIP_URL` | `http://127.0.0.1:8090` |
    /// | `CLIP_MODEL` | `clip-vit-base-patch16` |
    /// | `EMBED_TIMEOUT_SECS` | `30` |
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("CLIP_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("CLIP_MODEL") {
            if !model.is_empty() {
                config.model = model;
            }
        }
        if let Some(secs) = std::env::var("EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }
}

#[derive(Serialize)]
struct ImageEmbeddingRequest<'a> {
    model: &'a str,
    image: String, // base64 encoded
}

#[derive(Serialize)]
struct TextEmbeddingRequest<'a> {
    model: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// HTTP client for a CLIP embedding server.
pub struct ClipHttpBackend {
    config: ClipConfig,
    client: reqwest::Client,
}

impl ClipHttpBackend {
    pub fn new(config: ClipConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(ClipConfig::from_env())
    }

    async fn post<T: Serialize + ?Sized>(&self, route: &str, body: &T) -> Result<Vector> {
        let start = Instant::now();
        let url = format!("{}{}", self.config.base_url, route);
        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(
                subsystem = "inference",
                component = "clip",
                route,
                status = status.as_u16(),
                "Embedding server rejected request"
            );
            return Err(Error::Embedding(format!(
                "Embedding server returned {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse embedding response: {}", e)))?;

        if result.embedding.len() != self.config.dimension {
            return Err(Error::Embedding(format!(
                "Embedding server returned {} dimensions, expected {}",
                result.embedding.len(),
                self.config.dimension
            )));
        }

        debug!(
            subsystem = "inference",
            component = "clip",
            route,
            duration_ms = start.elapsed().as_millis() as u64,
            "Embedding computed"
        );
        Ok(Vector::from(result.embedding))
    }
}

#[async_trait]
impl MediaEmbedder for ClipHttpBackend {
    async fn embed_image(&self, image: &[u8]) -> Result<Vector> {
        if image.is_empty() {
            return Err(Error::Decode("Empty image".to_string()));
        }
        let request = ImageEmbeddingRequest {
            model: &self.config.model,
            image: base64::engine::general_purpose::STANDARD.encode(image),
        };
        self.post("/v1/embeddings/image", &request).await
    }

    async fn embed_text(&self, text: &str) -> Result<Vector> {
        let request = TextEmbeddingRequest {
            model: &self.config.model,
            text,
        };
        self.post("/v1/embeddings/text", &request).await
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer, dimension: usize) -> ClipHttpBackend {
        ClipHttpBackend::new(ClipConfig {
            base_url: server.uri(),
            model: "clip-test".to_string(),
            dimension,
            timeout: Duration::from_secs(5),
        })
    }

    #[test]
    fn test_config_defaults() {
        let config = ClipConfig::default();
        assert_eq!(config.base_url, CLIP_URL);
        assert_eq!(config.model, CLIP_MODEL);
        assert_eq!(config.dimension, 512);
    }

    #[test]
    fn test_image_request_serialization() {
        let request = ImageEmbeddingRequest {
            model: "clip",
            image: "aGVsbG8=".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "clip");
        assert_eq!(json["image"], "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_embed_image_sends_base64_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings/image"))
            .and(body_partial_json(serde_json::json!({
                "model": "clip-test",
                "image": "aGVsbG8="
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "embedding": [0.1, 0.2, 0.3] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let vector = backend(&server, 3).embed_image(b"hello").await.unwrap();
        assert_eq!(vector.as_slice(), &[0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_embed_text_uses_text_route() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings/text"))
            .and(body_partial_json(serde_json::json!({ "text": "a cat" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embedding": [1.0, 0.0] })),
            )
            .mount(&server)
            .await;

        let vector = backend(&server, 2).embed_text("a cat").await.unwrap();
        assert_eq!(vector.as_slice(), &[1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_embedding_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embedding": [1.0] })),
            )
            .mount(&server)
            .await;

        let err = backend(&server, 512).embed_text("x").await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let err = backend(&server, 2).embed_image(b"img").await.unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
    }

    #[tokio::test]
    async fn test_empty_image_rejected_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = backend(&server, 2).embed_image(&[]).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
