use crate::models::{canonical_id, IndexedRecord, NewRecord, ScoredRecord};
use crate::traits::VectorStore;
use crate::BotError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

const BACKEND: &str = "memory";

#[derive(Debug)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    text: String,
    page: Option<u32>,
}

#[derive(Debug)]
struct Collection {
    dimension: usize,
    points: Vec<StoredPoint>,
}

/// In-process store with cosine scoring. Behaves like the remote store for
/// the error cases callers care about.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Collection>>, BotError> {
        self.collections
            .lock()
            .map_err(|_| BotError::remote(BACKEND, "store lock poisoned"))
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn list_collections(&self) -> Result<Vec<String>, BotError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, BotError> {
        Ok(self.lock()?.contains_key(name))
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<(), BotError> {
        let mut collections = self.lock()?;
        if collections.contains_key(name) {
            return Err(BotError::rejected(
                BACKEND,
                format!("collection {name} already exists"),
            ));
        }
        collections.insert(
            name.to_string(),
            Collection {
                dimension,
                points: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), BotError> {
        self.lock()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BotError::CollectionNotFound(name.to_string()))
    }

    async fn upsert(&self, collection: &str, records: &[NewRecord]) -> Result<(), BotError> {
        let mut collections = self.lock()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| BotError::CollectionNotFound(collection.to_string()))?;

        if let Some(bad) = records
            .iter()
            .find(|record| record.vector.len() != target.dimension)
        {
            return Err(BotError::rejected(
                BACKEND,
                format!(
                    "vector dimension {} does not match collection dimension {}",
                    bad.vector.len(),
                    target.dimension
                ),
            ));
        }

        for record in records {
            let point = StoredPoint {
                id: canonical_id(&record.id),
                vector: record.vector.clone(),
                text: record.text.clone(),
                page: record.page,
            };
            match target.points.iter_mut().find(|stored| stored.id == point.id) {
                Some(stored) => *stored = point,
                None => target.points.push(point),
            }
        }

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, BotError> {
        let collections = self.lock()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| BotError::CollectionNotFound(collection.to_string()))?;

        if vector.len() != target.dimension {
            return Err(BotError::rejected(
                BACKEND,
                format!(
                    "query dimension {} does not match collection dimension {}",
                    vector.len(),
                    target.dimension
                ),
            ));
        }

        let mut scored = target
            .points
            .iter()
            .map(|point| ScoredRecord {
                id: point.id.clone(),
                score: cosine(&point.vector, vector),
                text: point.text.clone(),
            })
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(limit);

        Ok(scored)
    }

    async fn fetch(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<IndexedRecord>, BotError> {
        let collections = self.lock()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| BotError::CollectionNotFound(collection.to_string()))?;

        Ok(ids
            .iter()
            .map(|id| canonical_id(id))
            .filter_map(|id| target.points.iter().find(|point| point.id == id))
            .map(|point| IndexedRecord {
                id: point.id.clone(),
                text: Some(point.text.clone()),
                page: point.page,
            })
            .collect())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), BotError> {
        let mut collections = self.lock()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| BotError::CollectionNotFound(collection.to_string()))?;

        let ids = ids.iter().map(|id| canonical_id(id)).collect::<Vec<_>>();
        target.points.retain(|point| !ids.contains(&point.id));
        Ok(())
    }
}

fn cosine(left: &[f32], right: &[f32]) -> f64 {
    let dot = left
        .iter()
        .zip(right)
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum::<f64>();
    let norm = |values: &[f32]| {
        values
            .iter()
            .map(|value| f64::from(*value).powi(2))
            .sum::<f64>()
            .sqrt()
    };
    let denominator = norm(left) * norm(right);
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::models::NewRecord;
    use crate::traits::VectorStore;
    use crate::BotError;

    fn record(id: &str, vector: Vec<f32>, text: &str) -> NewRecord {
        NewRecord {
            id: id.to_string(),
            vector,
            text: text.to_string(),
            page: None,
        }
    }

    #[tokio::test]
    async fn search_orders_by_cosine_similarity() {
        let store = MemoryStore::new();
        store.create_collection("docs", 2).await.expect("create");
        store
            .upsert(
                "docs",
                &[
                    record("1", vec![1.0, 0.0], "east"),
                    record("2", vec![0.0, 1.0], "north"),
                ],
            )
            .await
            .expect("upsert");

        let hits = store.search("docs", &[0.1, 0.9], 2).await.expect("search");
        assert_eq!(hits[0].text, "north");
        assert_eq!(hits[1].text, "east");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = MemoryStore::new();
        store.create_collection("docs", 3).await.expect("create");

        let result = store.upsert("docs", &[record("1", vec![1.0], "short")]).await;
        assert!(matches!(result, Err(BotError::Rejected { .. })));
    }

    #[tokio::test]
    async fn duplicate_collection_is_rejected() {
        let store = MemoryStore::new();
        store.create_collection("docs", 3).await.expect("create");
        assert!(matches!(
            store.create_collection("docs", 3).await,
            Err(BotError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn upserting_an_existing_id_replaces_the_point() {
        let store = MemoryStore::new();
        store.create_collection("docs", 2).await.expect("create");
        let id = "5c56c793-69f3-4fbf-87e6-c4bf54c28c26";
        store
            .upsert("docs", &[record(id, vec![1.0, 0.0], "draft")])
            .await
            .expect("first write");
        store
            .upsert(
                "docs",
                &[record(&id.to_uppercase(), vec![1.0, 0.0], "final")],
            )
            .await
            .expect("second write");

        let hits = store.search("docs", &[1.0, 0.0], 10).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "final");
    }
}
