use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("pdf extraction failed: {0}")]
    Extraction(String),

    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("remote service {backend} failed: {details}")]
    RemoteService { backend: String, details: String },

    #[error("remote service {backend} rejected the request: {details}")]
    Rejected { backend: String, details: String },

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("invalid dimension {0}: must be a positive integer")]
    InvalidDimension(i64),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("answer generation failed: {0}")]
    Generation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BotError {
    pub fn remote(backend: impl Into<String>, details: impl ToString) -> Self {
        Self::RemoteService {
            backend: backend.into(),
            details: details.to_string(),
        }
    }

    /// A request the remote side refused outright; sending it again gives the
    /// same answer.
    pub fn rejected(backend: impl Into<String>, details: impl ToString) -> Self {
        Self::Rejected {
            backend: backend.into(),
            details: details.to_string(),
        }
    }

    /// Only transport failures, throttling and server errors against the
    /// vector store are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteService { .. })
    }
}

pub type Result<T, E = BotError> = std::result::Result<T, E>;
