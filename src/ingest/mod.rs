//! Knowledge-base ingestion.
//!
//! Turns an extracted text document into embedded chunks and replaces the
//! `documents` collection with them. Runs from the `ingest` maintenance
//! binary, never from the bot itself.

/// Recursive character chunking
pub mod splitter;

use crate::config::{CHUNK_OVERLAP, CHUNK_SIZE};
use crate::db::{Database, DocumentChunk};
use crate::llm::Embedder;
use anyhow::Context as _;
use splitter::TextSplitter;
use tracing::info;

/// Embed every chunk in order, logging progress per chunk.
///
/// # Errors
///
/// Fails on the first chunk the embedding backend rejects; nothing is
/// written in that case.
pub async fn embed_chunks(
    embedder: &impl Embedder,
    chunks: &[String],
) -> anyhow::Result<Vec<DocumentChunk>> {
    let mut documents = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        info!("Processing chunk {}/{}", i + 1, chunks.len());
        let embedding = embedder
            .embed(chunk)
            .await
            .with_context(|| format!("embedding chunk {}", i + 1))?;
        documents.push(DocumentChunk {
            text: chunk.clone(),
            embedding,
        });
    }
    Ok(documents)
}

/// Split, embed and store a document, replacing all existing chunks.
///
/// Embeddings are produced before anything is deleted, so a failed run
/// leaves the previous knowledge base intact.
///
/// # Errors
///
/// Returns an error when embedding fails or the database rejects the
/// replacement.
pub async fn load_document(
    db: &Database,
    embedder: &impl Embedder,
    text: &str,
) -> anyhow::Result<usize> {
    let splitter = TextSplitter::new(CHUNK_SIZE, CHUNK_OVERLAP);
    let chunks = splitter.split(text);
    info!("Split document into {} chunks", chunks.len());

    let documents = embed_chunks(embedder, &chunks).await?;

    db.replace_documents(&documents)
        .await
        .context("replacing knowledge-base documents")?;
    info!("Successfully stored {} documents", documents.len());
    Ok(documents.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockEmbedder};

    #[tokio::test]
    async fn embeds_chunks_in_order() {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .times(2)
            .returning(|text| Ok(vec![text.len() as f32]));

        let chunks = vec!["first".to_string(), "second!".to_string()];
        let documents = embed_chunks(&embedder, &chunks)
            .await
            .expect("embedding should succeed");

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].text, "first");
        assert_eq!(documents[0].embedding, vec![5.0]);
        assert_eq!(documents[1].text, "second!");
        assert_eq!(documents[1].embedding, vec![7.0]);
    }

    #[tokio::test]
    async fn stops_at_first_embedding_failure() {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .times(1)
            .returning(|_| Err(LlmError::ApiError("rate limited".to_string())));

        let chunks = vec!["first".to_string(), "second".to_string()];
        let result = embed_chunks(&embedder, &chunks).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_document_embeds_nothing() {
        let embedder = MockEmbedder::new();
        let documents = embed_chunks(&embedder, &[])
            .await
            .expect("embedding should succeed");
        assert!(documents.is_empty());
    }
}
