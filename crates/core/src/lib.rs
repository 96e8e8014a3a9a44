pub mod admin;
pub mod config;
pub mod dedup;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod qa;
pub mod retry;
pub mod session;
pub mod stores;
pub mod traits;

pub use admin::{parse_id_list, AdminCommand, AdminOutcome};
pub use config::{BotConfig, OpenAiConfig, QdrantConfig, DEFAULT_COLLECTION, DEFAULT_TOP_K};
pub use dedup::unique_texts;
pub use embeddings::{CharacterNgramEmbedder, Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{BotError, Result};
pub use extractor::{extract_page_texts, read_pdf_file, LopdfExtractor, PageText, PdfExtractor};
pub use index::VectorIndexClient;
pub use ingest::{digest_bytes, ingest_pdf, ingest_pdf_with};
pub use models::{
    canonical_id, FetchReport, IndexedRecord, IngestionLimits, IngestionReport, NewRecord,
    ScoredRecord,
};
pub use qa::{
    render_stuff_prompt, validate_question, AnswerGenerator, OpenAiGenerator, QaAnswer,
    QaOrchestrator, QaState, MAX_QUESTION_CHARS,
};
pub use retry::RetryPolicy;
pub use session::{ChatLog, ChatTurn, Session};
pub use stores::{MemoryStore, QdrantStore};
pub use traits::VectorStore;
