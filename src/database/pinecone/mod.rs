pub mod vector_store;

use serde::{Deserialize, Deserializer, Serialize};

pub use vector_store::VectorStore;

/// Metadata stored alongside every chunk vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorMetadata {
    #[serde(default)]
    pub text: String,
    #[serde(default = "unknown_source")]
    pub source: String,
    #[serde(default, deserialize_with = "deserialize_index")]
    pub chunk_index: usize,
}

/// Source name reported for vectors stored without one
pub(crate) fn unknown_source() -> String {
    "Unknown".to_string()
}

impl Default for VectorMetadata {
    #[inline]
    fn default() -> Self {
        Self {
            text: String::new(),
            source: unknown_source(),
            chunk_index: 0,
        }
    }
}

// Numeric metadata comes back from the index as floating point
fn deserialize_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .or_else(|| {
            value
                .as_f64()
                .filter(|n| *n >= 0.0 && n.fract() == 0.0)
                .map(|n| n as usize)
        })
        .unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// A chunk returned by similarity search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchMatch {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub source: String,
}

/// One indexed document and the vector ids that belong to it
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceSummary {
    pub name: String,
    pub chunks: usize,
    pub ids: Vec<String>,
}

/// Result of enumerating sources through a capped scan
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SourceListing {
    pub sources: Vec<SourceSummary>,
    /// Vectors returned by the scan
    pub scanned: usize,
    /// Vectors the index reported holding
    pub total_vectors: usize,
    /// True when the index holds more vectors than a single scan can return
    pub truncated: bool,
}

impl SourceListing {
    #[inline]
    pub fn find(&self, name: &str) -> Option<&SourceSummary> {
        self.sources.iter().find(|s| s.name == name)
    }

    #[inline]
    pub fn total_chunks(&self) -> usize {
        self.sources.iter().map(|s| s.chunks).sum()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    #[serde(default)]
    pub dimension: usize,
    #[serde(default, rename = "totalVectorCount")]
    pub total_vector_count: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Vector ids the scan attributed to the source
    pub found: usize,
    pub deleted: usize,
    /// Set when the scan was capped, so vectors of the source may remain
    pub possibly_incomplete: bool,
}

impl DeleteOutcome {
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.found > 0 && self.deleted == self.found
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IndexStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub state: String,
}

/// Control-plane description of an index
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IndexDescription {
    pub name: String,
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub status: Option<IndexStatus>,
}
