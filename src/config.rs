//! Configuration and settings management
//!
//! Loads settings from environment variables and defines the tunables for
//! retrieval, OpenAI calls and MongoDB connections.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use thiserror::Error;

/// Chat model used to answer questions
pub const CHAT_MODEL: &str = "gpt-3.5-turbo";
/// Sampling temperature for answers
pub const CHAT_TEMPERATURE: f32 = 0.3;
/// Embedding model for document and query vectors
pub const EMBEDDING_MODEL: &str = "text-embedding-ada-002";
/// OpenAI API base URL
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Default database name
pub const DEFAULT_DB_NAME: &str = "quantified_ante";
/// Default health listener port
pub const DEFAULT_PORT: u16 = 8080;

// Retrieval configuration
/// Number of context chunks returned per question
pub const SEARCH_TOP_K: usize = 5;
/// Sections shorter than this are discarded as noise
pub const CONTEXT_MIN_CHARS: usize = 50;
/// Vector fallback kicks in below this many text-search contexts
pub const VECTOR_FALLBACK_THRESHOLD: usize = 2;

// MongoDB configuration
/// Server selection and connect timeout
pub const MONGO_TIMEOUT_SECS: u64 = 5;
/// Connection pool upper bound
pub const MONGO_MAX_POOL: u32 = 3;
/// Connection pool lower bound
pub const MONGO_MIN_POOL: u32 = 1;

// Ingestion configuration
/// Target chunk length in characters
pub const CHUNK_SIZE: usize = 1000;
/// Overlap carried between consecutive chunks
pub const CHUNK_OVERLAP: usize = 200;

/// Recent Q&A entries shown by the stats command
pub const STATS_RECENT_LIMIT: i64 = 5;

/// Raw environment snapshot before validation
#[derive(Debug, Deserialize, Default)]
struct RawSettings {
    /// Discord bot token
    discord_token: Option<String>,
    /// OpenAI API key
    openai_api_key: Option<String>,
    /// MongoDB connection string
    mongodb_uri: Option<String>,
    /// Database name
    db_name: Option<String>,
    /// Health listener port
    port: Option<String>,
}

/// Validated application settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Discord bot token (`DISCORD_TOKEN`)
    pub discord_token: String,
    /// OpenAI API key (`OPENAI_API_KEY`)
    pub openai_api_key: String,
    /// MongoDB connection string (`MONGODB_URI`)
    pub mongodb_uri: String,
    /// Database name (`DB_NAME`)
    pub db_name: String,
    /// Health listener port (`PORT`)
    pub port: u16,
}

/// Errors produced while loading or validating settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// One or more required variables are absent from the environment
    #[error("Missing required environment variables: {0}")]
    MissingRequired(String),

    /// A variable is still set to its placeholder value
    #[error("{0} is set to a placeholder value, replace it with a real credential")]
    Placeholder(&'static str),

    /// `PORT` could not be parsed as a TCP port number
    #[error("Invalid PORT value {value:?}: {source}")]
    InvalidPort {
        /// The offending value
        value: String,
        /// Parse failure reason
        source: std::num::ParseIntError,
    },

    /// Underlying configuration loader failure
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Settings {
    /// Create new settings by loading from environment variables
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if a required variable is missing, a
    /// placeholder value was left in place or `PORT` is not a number.
    pub fn new() -> Result<Self, SettingsError> {
        let s = Config::builder()
            // Settings come from environment variables directly (without prefix)
            // Note: Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut raw: RawSettings = s.try_deserialize()?;

        // Fallback: Check environment variables directly if config didn't pick them up
        // This handles cases where automatic mapping might fail or behavior differs
        if raw.discord_token.is_none() {
            if let Ok(val) = std::env::var("DISCORD_TOKEN") {
                if !val.is_empty() {
                    raw.discord_token = Some(val);
                }
            }
        }
        if raw.openai_api_key.is_none() {
            if let Ok(val) = std::env::var("OPENAI_API_KEY") {
                if !val.is_empty() {
                    raw.openai_api_key = Some(val);
                }
            }
        }
        if raw.mongodb_uri.is_none() {
            if let Ok(val) = std::env::var("MONGODB_URI") {
                if !val.is_empty() {
                    raw.mongodb_uri = Some(val);
                }
            }
        }

        Self::validate(raw)
    }

    /// Check required variables all at once so the error names every
    /// missing one, then apply defaults for the optional ones.
    fn validate(raw: RawSettings) -> Result<Self, SettingsError> {
        let mut missing = Vec::new();
        if raw.discord_token.is_none() {
            missing.push("DISCORD_TOKEN");
        }
        if raw.openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }
        if raw.mongodb_uri.is_none() {
            missing.push("MONGODB_URI");
        }
        if !missing.is_empty() {
            return Err(SettingsError::MissingRequired(missing.join(", ")));
        }

        let discord_token = raw.discord_token.unwrap_or_default();
        let openai_api_key = raw.openai_api_key.unwrap_or_default();
        let mongodb_uri = raw.mongodb_uri.unwrap_or_default();

        if openai_api_key == "your_openai_api_key" {
            return Err(SettingsError::Placeholder("OPENAI_API_KEY"));
        }
        if mongodb_uri == "your_mongodb_uri" {
            return Err(SettingsError::Placeholder("MONGODB_URI"));
        }

        let port = match raw.port {
            None => DEFAULT_PORT,
            Some(value) => value
                .parse()
                .map_err(|source| SettingsError::InvalidPort { value, source })?,
        };

        Ok(Self {
            discord_token,
            openai_api_key,
            mongodb_uri,
            db_name: raw.db_name.unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            port,
        })
    }

    /// Log the non-secret parts of the loaded configuration
    pub fn log_summary(&self) {
        tracing::info!("Environment variables loaded");
        tracing::info!("Database name: {}", self.db_name);
        tracing::info!("Health port: {}", self.port);
    }
}

/// HTTP timeout for OpenAI calls in seconds, overridable via
/// `LLM_HTTP_TIMEOUT_SECS`
#[must_use]
pub fn get_llm_http_timeout_secs() -> u64 {
    std::env::var("LLM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30)
}
