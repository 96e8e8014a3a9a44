use crate::models::{IndexedRecord, NewRecord, ScoredRecord};
use crate::BotError;
use async_trait::async_trait;

/// Raw operations against a vector database. Implementations do not embed
/// text and do not retry.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>, BotError>;

    async fn collection_exists(&self, name: &str) -> Result<bool, BotError>;

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<(), BotError>;

    async fn delete_collection(&self, name: &str) -> Result<(), BotError>;

    /// Writes each record under its id, replacing a point that already has
    /// that id.
    async fn upsert(&self, collection: &str, records: &[NewRecord]) -> Result<(), BotError>;

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, BotError>;

    /// Unknown ids are left out of the result.
    async fn fetch(&self, collection: &str, ids: &[String])
        -> Result<Vec<IndexedRecord>, BotError>;

    /// Unknown ids are ignored.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), BotError>;
}
