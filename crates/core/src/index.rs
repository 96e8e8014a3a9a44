use crate::embeddings::Embedder;
use crate::models::{canonical_id, FetchReport, NewRecord, ScoredRecord};
use crate::retry::RetryPolicy;
use crate::traits::VectorStore;
use crate::BotError;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

/// Text in, vectors out: the one place that talks to the vector store.
pub struct VectorIndexClient<S, E> {
    store: S,
    embedder: E,
    retry: RetryPolicy,
}

impl<S, E> VectorIndexClient<S, E>
where
    S: VectorStore,
    E: Embedder,
{
    pub fn new(store: S, embedder: E, retry: RetryPolicy) -> Self {
        Self {
            store,
            embedder,
            retry,
        }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Embeds and writes `texts` into an existing collection. Never creates
    /// the collection.
    pub async fn upsert_texts(
        &self,
        collection: &str,
        texts: &[String],
    ) -> Result<Vec<String>, BotError> {
        self.upsert_pages(
            collection,
            &texts.iter().map(|text| (text.clone(), None)).collect::<Vec<_>>(),
        )
        .await
    }

    /// Like [`Self::upsert_texts`], keeping the source page number in the
    /// stored metadata.
    pub async fn upsert_pages(
        &self,
        collection: &str,
        pages: &[(String, Option<u32>)],
    ) -> Result<Vec<String>, BotError> {
        validate_name(collection)?;
        if !self.ensure_exists(collection).await? {
            return Err(BotError::CollectionNotFound(collection.to_string()));
        }

        if pages.is_empty() {
            return Ok(Vec::new());
        }

        let texts = pages.iter().map(|(text, _)| text.clone()).collect::<Vec<_>>();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != pages.len() {
            return Err(BotError::EmbeddingProvider(format!(
                "embedding count {} doesn't match text count {}",
                vectors.len(),
                pages.len()
            )));
        }

        let records = pages
            .iter()
            .zip(vectors)
            .map(|((text, page), vector)| NewRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                text: text.clone(),
                page: *page,
            })
            .collect::<Vec<_>>();

        self.retry
            .run("upsert", || self.store.upsert(collection, &records))
            .await?;
        info!(collection, records = records.len(), "upserted records");
        Ok(records.into_iter().map(|record| record.id).collect())
    }

    pub async fn similarity_search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredRecord>, BotError> {
        validate_name(collection)?;
        if k == 0 {
            return Err(BotError::Validation("k must be at least 1".to_string()));
        }
        if query.trim().is_empty() {
            return Err(BotError::Validation("query is empty".to_string()));
        }

        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors.pop().ok_or_else(|| {
            BotError::EmbeddingProvider("provider returned no vector for the query".to_string())
        })?;

        let hits = self
            .retry
            .run("search", || self.store.search(collection, &vector, k))
            .await?;
        debug!(collection, k, hits = hits.len(), "similarity search");
        Ok(hits)
    }

    pub async fn fetch_by_ids(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<FetchReport, BotError> {
        validate_name(collection)?;
        validate_ids(ids)?;

        let found = self
            .retry
            .run("fetch", || self.store.fetch(collection, ids))
            .await?;
        let returned = found
            .iter()
            .map(|record| canonical_id(&record.id))
            .collect::<HashSet<_>>();
        let missing = ids
            .iter()
            .filter(|id| !returned.contains(&canonical_id(id)))
            .cloned()
            .collect();

        Ok(FetchReport { found, missing })
    }

    pub async fn delete_by_ids(&self, collection: &str, ids: &[String]) -> Result<(), BotError> {
        validate_name(collection)?;
        validate_ids(ids)?;

        self.retry
            .run("delete", || self.store.delete(collection, ids))
            .await?;
        info!(collection, ids = ids.len(), "deleted records");
        Ok(())
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, BotError> {
        self.retry
            .run("list_collections", || self.store.list_collections())
            .await
    }

    pub async fn create_collection(&self, name: &str, dimension: i64) -> Result<(), BotError> {
        validate_name(name)?;
        let size = usize::try_from(dimension)
            .ok()
            .filter(|size| *size > 0)
            .ok_or(BotError::InvalidDimension(dimension))?;

        self.retry
            .run("create_collection", || self.store.create_collection(name, size))
            .await?;
        info!(collection = name, dimension = size, "created collection");
        Ok(())
    }

    pub async fn delete_collection(&self, name: &str) -> Result<(), BotError> {
        validate_name(name)?;
        if !self.ensure_exists(name).await? {
            return Err(BotError::CollectionNotFound(name.to_string()));
        }

        self.retry
            .run("delete_collection", || self.store.delete_collection(name))
            .await?;
        info!(collection = name, "deleted collection");
        Ok(())
    }

    async fn ensure_exists(&self, name: &str) -> Result<bool, BotError> {
        self.retry
            .run("collection_exists", || self.store.collection_exists(name))
            .await
    }
}

fn validate_name(name: &str) -> Result<(), BotError> {
    if name.trim().is_empty() {
        return Err(BotError::Validation("collection name is required".to_string()));
    }
    Ok(())
}

fn validate_ids(ids: &[String]) -> Result<(), BotError> {
    if ids.is_empty() {
        return Err(BotError::Validation("at least one id is required".to_string()));
    }
    if ids.iter().any(|id| id.trim().is_empty()) {
        return Err(BotError::Validation("ids must not be blank".to_string()));
    }
    Ok(())
}
