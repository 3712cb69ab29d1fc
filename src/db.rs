//! MongoDB persistence layer
//!
//! Owns the connection to the `documents` and `qa_history` collections and
//! the queries behind the bot commands, retrieval and the health endpoint.

use crate::config::{MONGO_MAX_POOL, MONGO_MIN_POOL, MONGO_TIMEOUT_SECS, STATS_RECENT_LIMIT};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Collection holding embedded document chunks
const DOCUMENTS_COLLECTION: &str = "documents";
/// Collection holding the Q&A audit trail
const QA_COLLECTION: &str = "qa_history";
/// Atlas search index used by the vector fallback
const VECTOR_INDEX: &str = "vector_index";

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from the MongoDB driver
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

/// A stored document chunk with its embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Chunk text as stored in the knowledge base
    pub text: String,
    /// Embedding vector for the chunk
    pub embedding: Vec<f32>,
}

/// One Q&A exchange recorded for the stats command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaRecord {
    /// When the question was asked
    pub timestamp: BsonDateTime,
    /// Guild (server) ID as a string
    pub guild_id: String,
    /// Guild display name
    pub guild_name: String,
    /// Asking user's ID as a string
    pub user_id: String,
    /// Asking user's name
    pub username: String,
    /// The question text
    pub question: String,
    /// The answer, or the failure notice
    pub answer: String,
    /// Whether a grounded answer was produced
    pub success: bool,
}

impl QaRecord {
    /// Timestamp as a UTC datetime for display formatting
    #[must_use]
    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp.timestamp_millis()).unwrap_or_default()
    }
}

/// Aggregated Q&A statistics for one guild
#[derive(Debug)]
pub struct GuildStats {
    /// Total questions asked in the guild
    pub total: u64,
    /// Questions that produced a grounded answer
    pub successful: u64,
    /// Most recent exchanges, newest first
    pub recent: Vec<QaRecord>,
}

/// Snapshot returned by a successful connectivity check
#[derive(Debug)]
pub struct ConnectionStatus {
    /// Name of the connected database
    pub database: String,
    /// When the server last answered a ping
    pub last_heartbeat: DateTime<Utc>,
}

/// Collection summary for the debug command
#[derive(Debug)]
pub struct DebugInfo {
    /// Number of chunks in the documents collection
    pub documents: u64,
    /// Number of recorded Q&A exchanges
    pub qa_entries: u64,
    /// Field names of one sample document, if any exist
    pub sample_fields: Option<Vec<String>>,
}

/// Interface for retrieval queries against the documents collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Fetch chunk texts matching a regex filter
    async fn text_search(&self, filter: Document, limit: usize) -> Result<Vec<String>, DbError>;
    /// Fetch chunk texts nearest to an embedding vector
    async fn vector_search(
        &self,
        embedding: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<String>, DbError>;
}

/// MongoDB-backed store shared by the bot, retrieval and the health endpoint
#[derive(Clone)]
pub struct Database {
    client: Client,
    database: mongodb::Database,
    last_heartbeat: Arc<AtomicI64>,
}

impl Database {
    /// Connect to MongoDB and verify the server answers a ping.
    ///
    /// The pool is kept small and timeouts short so a broken database
    /// surfaces quickly instead of hanging command handlers.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the URI is invalid or the server is
    /// unreachable within the timeout.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, DbError> {
        info!("Initializing MongoDB connection...");

        let mut options = ClientOptions::parse(uri).await?;
        options.server_selection_timeout = Some(Duration::from_secs(MONGO_TIMEOUT_SECS));
        options.connect_timeout = Some(Duration::from_secs(MONGO_TIMEOUT_SECS));
        options.max_pool_size = Some(MONGO_MAX_POOL);
        options.min_pool_size = Some(MONGO_MIN_POOL);

        let client = Client::with_options(options)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        let database = client.database(db_name);
        info!("MongoDB connection initialized successfully");

        Ok(Self {
            client,
            database,
            last_heartbeat: Arc::new(AtomicI64::new(Utc::now().timestamp_millis())),
        })
    }

    fn docs(&self) -> Collection<Document> {
        self.database.collection(DOCUMENTS_COLLECTION)
    }

    fn qa(&self) -> Collection<QaRecord> {
        self.database.collection(QA_COLLECTION)
    }

    /// Name of the connected database
    #[must_use]
    pub fn name(&self) -> String {
        self.database.name().to_string()
    }

    /// Ping the server and refresh the heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] when the server does not answer.
    pub async fn test_connection(&self) -> Result<ConnectionStatus, DbError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        let now = Utc::now();
        self.last_heartbeat
            .store(now.timestamp_millis(), Ordering::SeqCst);

        Ok(ConnectionStatus {
            database: self.name(),
            last_heartbeat: now,
        })
    }

    /// Store one Q&A exchange in the audit trail.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] when the insert fails.
    pub async fn record_qa(&self, record: QaRecord) -> Result<(), DbError> {
        self.qa().insert_one(record).await?;
        Ok(())
    }

    /// Aggregate Q&A statistics for one guild.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] when a query fails.
    pub async fn guild_stats(&self, guild_id: &str) -> Result<GuildStats, DbError> {
        let qa = self.qa();
        let total = qa.count_documents(doc! { "guild_id": guild_id }).await?;
        let successful = qa
            .count_documents(doc! { "guild_id": guild_id, "success": true })
            .await?;
        let recent = qa
            .find(doc! { "guild_id": guild_id })
            .sort(doc! { "timestamp": -1 })
            .limit(STATS_RECENT_LIMIT)
            .await?
            .try_collect()
            .await?;

        Ok(GuildStats {
            total,
            successful,
            recent,
        })
    }

    /// Collection counts and a sample of stored field names.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] when a query fails.
    pub async fn debug_info(&self) -> Result<DebugInfo, DbError> {
        let documents = self.docs().count_documents(doc! {}).await?;
        let qa_entries = self.qa().count_documents(doc! {}).await?;
        let sample_fields = self
            .docs()
            .find_one(doc! {})
            .await?
            .map(|d| d.keys().map(ToString::to_string).collect());

        Ok(DebugInfo {
            documents,
            qa_entries,
            sample_fields,
        })
    }

    /// Replace the whole knowledge base with freshly embedded chunks.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] when the delete or insert fails.
    pub async fn replace_documents(&self, chunks: &[DocumentChunk]) -> Result<(), DbError> {
        let deleted = self.docs().delete_many(doc! {}).await?.deleted_count;
        info!("Cleared {deleted} existing documents");

        if !chunks.is_empty() {
            self.database
                .collection::<DocumentChunk>(DOCUMENTS_COLLECTION)
                .insert_many(chunks)
                .await?;
        }
        info!("Stored {} documents", chunks.len());
        Ok(())
    }
}

#[async_trait]
impl ChunkSource for Database {
    async fn text_search(&self, filter: Document, limit: usize) -> Result<Vec<String>, DbError> {
        let mut cursor = self
            .docs()
            .find(filter)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await?;

        let mut texts = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            if let Ok(text) = document.get_str("text") {
                texts.push(text.to_string());
            }
        }
        debug!("Text search matched {} documents", texts.len());
        Ok(texts)
    }

    async fn vector_search(
        &self,
        embedding: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<String>, DbError> {
        let vector: Vec<Bson> = embedding
            .iter()
            .map(|v| Bson::Double(f64::from(*v)))
            .collect();
        let pipeline = vec![doc! {
            "$search": {
                "index": VECTOR_INDEX,
                "knnBeta": {
                    "vector": vector,
                    "path": "embedding",
                    "k": i64::try_from(limit).unwrap_or(i64::MAX),
                }
            }
        }];

        let mut cursor = self.docs().aggregate(pipeline).await?;
        let mut texts = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            if let Ok(text) = document.get_str("text") {
                texts.push(text.to_string());
            }
        }
        debug!("Vector search matched {} documents", texts.len());
        Ok(texts)
    }
}
