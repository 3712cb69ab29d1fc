//! OpenAI embedding provider.

use super::{Embedder, LlmError};
use crate::config::{get_llm_http_timeout_secs, EMBEDDING_MODEL, OPENAI_API_BASE};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Creates an HTTP client configured with the standard LLM timeout.
///
/// Uses `LLM_HTTP_TIMEOUT_SECS` environment variable or 30s default.
/// This prevents infinite hangs when the API is slow or unresponsive.
fn create_http_client() -> HttpClient {
    let timeout = Duration::from_secs(get_llm_http_timeout_secs());
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Embedding provider for the OpenAI embeddings endpoint.
pub struct EmbeddingProvider {
    http_client: HttpClient,
    api_key: String,
    api_base: String,
}

impl EmbeddingProvider {
    /// Create a new embedding provider instance.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            http_client: create_http_client(),
            api_key,
            api_base: OPENAI_API_BASE.to_string(),
        }
    }

    /// Generate an embedding vector for the given text using the specified model.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::NetworkError` on connectivity issues,
    /// `LlmError::ApiError` on non-success status codes or an empty response,
    /// `LlmError::JsonError` if the response cannot be parsed.
    pub async fn generate(&self, text: &str, model: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/embeddings", self.api_base);

        let body = serde_json::json!({
            "model": model,
            "input": text
        });

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!(
                "Embedding API error: {status} - {error_text}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::JsonError(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::ApiError("Empty embedding response".to_string()))
    }
}

#[async_trait::async_trait]
impl Embedder for EmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.generate(text, EMBEDDING_MODEL).await
    }
}
