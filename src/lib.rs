//! Quantified Ante Discord bot library.
//!
//! Retrieval-augmented Q&A over a MongoDB knowledge base, exposed through
//! Discord slash commands with a container health endpoint.

/// Discord client, slash commands and reply plumbing.
pub mod bot;
/// Configuration management.
pub mod config;
/// MongoDB layer: documents, Q&A history, stats.
pub mod db;
/// Materialization of recognized environment variables into `.env`.
pub mod env_file;
/// HTTP health endpoint.
pub mod health;
/// Knowledge-base ingestion and chunking.
pub mod ingest;
/// OpenAI chat and embedding clients.
pub mod llm;
/// Query expansion and two-stage retrieval.
pub mod search;
/// Utility functions.
pub mod utils;
