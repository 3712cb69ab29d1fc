//! OpenAI clients
//!
//! Chat completions answer questions grounded in retrieved context;
//! embeddings back the vector-search fallback and document ingestion.

pub mod chat;
pub mod embeddings;

pub use chat::ChatClient;
pub use embeddings::EmbeddingProvider;

use thiserror::Error;

/// Errors that can occur during OpenAI operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    JsonError(String),
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Interface for turning text into an embedding vector
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    /// Generate the embedding for `text`
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}
