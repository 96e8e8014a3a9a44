use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A vector about to be written. The id is chosen before the first attempt
/// so a repeated write replaces the point instead of adding another.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub page: Option<u32>,
}

/// UUIDs in lowercase hyphenated form, anything else trimmed.
pub fn canonical_id(id: &str) -> String {
    let id = id.trim();
    match Uuid::parse_str(id) {
        Ok(uuid) => uuid.to_string(),
        Err(_) => id.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedRecord {
    pub id: String,
    pub text: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FetchReport {
    pub found: Vec<IndexedRecord>,
    pub missing: Vec<String>,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionReport {
    pub checksum: String,
    pub page_count: usize,
    pub blank_pages: usize,
    pub unique_pages: usize,
    pub record_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionLimits {
    pub max_bytes: u64,
    pub max_pages: usize,
}

impl Default for IngestionLimits {
    fn default() -> Self {
        Self {
            max_bytes: 20 * 1024 * 1024,
            max_pages: 500,
        }
    }
}
