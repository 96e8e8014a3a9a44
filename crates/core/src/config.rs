use crate::error::BotError;
use crate::models::IngestionLimits;
use crate::retry::RetryPolicy;
use std::time::Duration;
use url::Url;

pub const DEFAULT_COLLECTION: &str = "pdfbot";
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    /// Sent as the `dimensions` request field when set.
    pub embedding_dimensions: Option<usize>,
    pub embedding_batch_size: usize,
    pub chat_model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_dimensions: None,
            embedding_batch_size: 64,
            chat_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn validate(&self) -> Result<(), BotError> {
        if self.api_key.trim().is_empty() {
            return Err(BotError::Validation("missing OpenAI API key".to_string()));
        }
        if self.embedding_model.trim().is_empty() || self.chat_model.trim().is_empty() {
            return Err(BotError::Validation("model names must not be blank".to_string()));
        }
        if self.embedding_batch_size == 0 {
            return Err(BotError::Validation(
                "embedding batch size must be at least 1".to_string(),
            ));
        }
        Url::parse(&self.base_url)?;
        Ok(())
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub qdrant: QdrantConfig,
    pub collection: String,
    pub top_k: usize,
    pub retry: RetryPolicy,
    pub limits: IngestionLimits,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            qdrant: QdrantConfig::default(),
            collection: DEFAULT_COLLECTION.to_string(),
            top_k: DEFAULT_TOP_K,
            retry: RetryPolicy::default(),
            limits: IngestionLimits::default(),
        }
    }
}

impl BotConfig {
    pub fn validate(&self) -> Result<(), BotError> {
        Url::parse(&self.qdrant.url)?;
        if self.collection.trim().is_empty() {
            return Err(BotError::Validation("collection name is required".to_string()));
        }
        if self.top_k == 0 {
            return Err(BotError::Validation("top_k must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(BotError::Validation(
                "retry policy needs at least one attempt".to_string(),
            ));
        }
        if self.limits.max_bytes == 0 || self.limits.max_pages == 0 {
            return Err(BotError::Validation(
                "ingestion limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
