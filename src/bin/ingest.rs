//! Knowledge-base loader.
//!
//! Reads an extracted text document, chunks and embeds it, and replaces
//! the `documents` collection. Run manually when the source material
//! changes:
//!
//! ```text
//! ingest strategy-guide.txt
//! ```

use anyhow::{bail, Context as _};
use quantified_ante_bot::config::DEFAULT_DB_NAME;
use quantified_ante_bot::db::Database;
use quantified_ante_bot::ingest;
use quantified_ante_bot::llm::EmbeddingProvider;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: ingest <document.txt>");
    };

    let mongodb_uri = std::env::var("MONGODB_URI").context("MONGODB_URI must be set")?;
    let openai_api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?;
    let db_name = std::env::var("DB_NAME")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_DB_NAME.to_string());

    info!("Starting document loading process...");
    let text =
        std::fs::read_to_string(&path).with_context(|| format!("reading document from {path}"))?;

    let db = Database::connect(&mongodb_uri, &db_name).await?;
    let embedder = EmbeddingProvider::new(openai_api_key);

    let stored = ingest::load_document(&db, &embedder, &text).await?;
    info!("Document loading complete: {stored} chunks stored");
    Ok(())
}
