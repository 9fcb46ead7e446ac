//! OpenAI-compatible embedding provider.
//!
//! Makes a single attempt per call; the embedding stage owns retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::EmbeddingProvider;
use crate::errors::EmbeddingError;

/// Connection settings for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub max_batch_size: usize,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            max_batch_size: 2048,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Async embeddings client for OpenAI-compatible endpoints.
pub struct OpenAiEmbeddingProvider {
    client: Client,
    endpoint: String,
    name: String,
    model: String,
    dimension: usize,
    max_batch_size: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, EmbeddingError> {
        if config.api_key.trim().is_empty() {
            return Err(EmbeddingError::authentication("missing embedding API key"));
        }
        if config.model.trim().is_empty() {
            return Err(EmbeddingError::malformed_request("missing embedding model name"));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| EmbeddingError::authentication("invalid embedding API key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::malformed_request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            name: format!("openai:{}", config.model),
            model: config.model,
            dimension: config.dimension,
            max_batch_size: config.max_batch_size.max(1),
        })
    }

    /// Classify a non-success HTTP status.
    fn status_error(status: StatusCode, body: String) -> EmbeddingError {
        let message = format!("embeddings request failed ({}): {}", status, body);
        match status {
            StatusCode::TOO_MANY_REQUESTS => EmbeddingError::rate_limited(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                EmbeddingError::authentication(message)
            }
            s if s.is_server_error() => EmbeddingError::transient(message),
            _ => EmbeddingError::malformed_request(message),
        }
    }

    fn send_error(err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            EmbeddingError::transient(err.to_string())
        } else {
            EmbeddingError::malformed_request(err.to_string())
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: Some(self.dimension),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(Self::send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Self::status_error(status, body));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::contract(format!("unreadable response: {}", e)))?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::contract(format!(
                "{} embeddings returned for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        debug!(count = texts.len(), model = %self.model, "Embedded batch");
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            OpenAiEmbeddingProvider::status_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
            EmbeddingError::RateLimited(_)
        ));
        assert!(matches!(
            OpenAiEmbeddingProvider::status_error(StatusCode::BAD_GATEWAY, String::new()),
            EmbeddingError::Transient(_)
        ));
        assert!(matches!(
            OpenAiEmbeddingProvider::status_error(StatusCode::UNAUTHORIZED, String::new()),
            EmbeddingError::Authentication(_)
        ));
        assert!(matches!(
            OpenAiEmbeddingProvider::status_error(StatusCode::BAD_REQUEST, String::new()),
            EmbeddingError::MalformedRequest(_)
        ));
    }

    #[test]
    fn test_missing_api_key() {
        let result = OpenAiEmbeddingProvider::new(OpenAiConfig::new("  "));
        assert!(matches!(result, Err(EmbeddingError::Authentication(_))));
    }

    #[test]
    fn test_endpoint_and_name() {
        let mut config = OpenAiConfig::new("sk-test");
        config.base_url = "http://localhost:8080/v1/".to_string();
        let provider = OpenAiEmbeddingProvider::new(config).unwrap();

        assert_eq!(provider.endpoint, "http://localhost:8080/v1/embeddings");
        assert_eq!(provider.name(), "openai:text-embedding-3-small");
        assert_eq!(provider.dimension(), 1536);
    }

    #[test]
    fn test_response_is_reordered_by_index() {
        let mut parsed: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"embedding":[2.0],"index":1},{"embedding":[1.0],"index":0}]}"#,
        )
        .unwrap();
        parsed.data.sort_by_key(|entry| entry.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0]);
    }
}
