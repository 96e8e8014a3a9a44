use crate::config::QdrantConfig;
use crate::models::{IndexedRecord, NewRecord, ScoredRecord};
use crate::traits::VectorStore;
use crate::BotError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

const BACKEND: &str = "qdrant";

/// Qdrant over its REST API. Collections use cosine distance.
pub struct QdrantStore {
    base: Url,
    client: Client,
}

impl QdrantStore {
    pub fn new(config: &QdrantConfig) -> Result<Self, BotError> {
        let base = Url::parse(&config.url)?;
        if base.cannot_be_a_base() {
            return Err(BotError::Validation(format!(
                "qdrant url cannot be used as a base: {}",
                config.url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = config.api_key.as_deref().map(str::trim) {
            if !api_key.is_empty() {
                headers.insert(
                    "api-key",
                    HeaderValue::from_str(api_key).map_err(|_| {
                        BotError::Validation("qdrant api key contains invalid characters".to_string())
                    })?,
                );
            }
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|error| BotError::remote(BACKEND, error))?;

        Ok(Self { base, client })
    }

    fn url(&self, segments: &[&str], wait: bool) -> Result<Url, BotError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BotError::remote(BACKEND, "base url cannot take a path"))?
            .pop_if_empty()
            .extend(segments);
        if wait {
            url.set_query(Some("wait=true"));
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BotError> {
        request
            .send()
            .await
            .map_err(|error| BotError::remote(BACKEND, error))
    }

    /// Maps a non-success status to the error taxonomy. A 404 on a
    /// collection route means the collection is missing; see
    /// [`status_error`] for the rest.
    async fn check(response: Response, collection: Option<&str>) -> Result<Value, BotError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            if let Some(name) = collection {
                return Err(BotError::CollectionNotFound(name.to_string()));
            }
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(status_error(status, body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|error| BotError::remote(BACKEND, error))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn list_collections(&self) -> Result<Vec<String>, BotError> {
        let url = self.url(&["collections"], false)?;
        let response = self.send(self.client.get(url)).await?;
        let parsed = Self::check(response, None).await?;

        Ok(parsed
            .pointer("/result/collections")
            .and_then(Value::as_array)
            .map(|collections| {
                collections
                    .iter()
                    .filter_map(|entry| entry.pointer("/name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, BotError> {
        let url = self.url(&["collections", name], false)?;
        let response = self.send(self.client.get(url)).await?;

        match Self::check(response, Some(name)).await {
            Ok(_) => Ok(true),
            Err(BotError::CollectionNotFound(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<(), BotError> {
        let url = self.url(&["collections", name], false)?;
        let body = json!({
            "vectors": {
                "size": dimension,
                "distance": "Cosine",
            }
        });
        let response = self.send(self.client.put(url).json(&body)).await?;
        Self::check(response, None).await?;
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), BotError> {
        let url = self.url(&["collections", name], false)?;
        let response = self.send(self.client.delete(url)).await?;
        let parsed = Self::check(response, Some(name)).await?;

        match parsed.pointer("/result").and_then(Value::as_bool) {
            Some(false) => Err(BotError::CollectionNotFound(name.to_string())),
            _ => Ok(()),
        }
    }

    async fn upsert(&self, collection: &str, records: &[NewRecord]) -> Result<(), BotError> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .iter()
            .map(|record| {
                let id = wire_point_id(&record.id).ok_or_else(|| {
                    BotError::Validation(format!(
                        "record id {} is neither a UUID nor an unsigned integer",
                        record.id
                    ))
                })?;
                Ok(json!({
                    "id": id,
                    "vector": record.vector,
                    "payload": {
                        "text": record.text,
                        "page": record.page,
                    },
                }))
            })
            .collect::<Result<Vec<_>, BotError>>()?;

        let url = self.url(&["collections", collection, "points"], true)?;
        let response = self
            .send(self.client.put(url).json(&json!({ "points": points })))
            .await?;
        Self::check(response, Some(collection)).await?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, BotError> {
        let url = self.url(&["collections", collection, "points", "search"], false)?;
        let response = self
            .send(self.client.post(url).json(&json!({
                "vector": vector,
                "limit": limit,
                "with_payload": true,
            })))
            .await?;
        let parsed = Self::check(response, Some(collection)).await?;

        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(hits
            .iter()
            .map(|hit| ScoredRecord {
                id: point_id(hit),
                score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
                text: hit
                    .pointer("/payload/text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect())
    }

    async fn fetch(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<IndexedRecord>, BotError> {
        // Qdrant only knows UUID and unsigned integer ids; anything else
        // cannot exist and would make the whole request fail.
        let wire_ids = ids.iter().filter_map(|id| wire_point_id(id)).collect::<Vec<_>>();
        if wire_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url(&["collections", collection, "points"], false)?;
        let response = self
            .send(self.client.post(url).json(&json!({
                "ids": wire_ids,
                "with_payload": true,
                "with_vector": false,
            })))
            .await?;
        let parsed = Self::check(response, Some(collection)).await?;

        let points = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(points
            .iter()
            .map(|point| IndexedRecord {
                id: point_id(point),
                text: point
                    .pointer("/payload/text")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                page: point
                    .pointer("/payload/page")
                    .and_then(Value::as_u64)
                    .and_then(|page| u32::try_from(page).ok()),
            })
            .collect())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), BotError> {
        let wire_ids = ids.iter().filter_map(|id| wire_point_id(id)).collect::<Vec<_>>();
        if wire_ids.is_empty() {
            return Ok(());
        }

        let url = self.url(&["collections", collection, "points", "delete"], true)?;
        let response = self
            .send(self.client.post(url).json(&json!({ "points": wire_ids })))
            .await?;
        Self::check(response, Some(collection)).await?;
        Ok(())
    }
}

/// Throttling and server errors may clear up; any other status will not.
fn status_error(status: StatusCode, body: String) -> BotError {
    let details = format!("{status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        BotError::remote(BACKEND, details)
    } else {
        BotError::rejected(BACKEND, details)
    }
}

fn wire_point_id(id: &str) -> Option<Value> {
    let id = id.trim();
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Some(Value::String(uuid.to_string()));
    }
    id.parse::<u64>().ok().map(Value::from)
}

fn point_id(point: &Value) -> String {
    match point.pointer("/id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    }
}
