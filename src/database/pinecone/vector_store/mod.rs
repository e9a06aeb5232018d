
use indicatif::ProgressBar;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    DeleteOutcome, IndexDescription, IndexStats, SearchMatch, SourceListing, SourceSummary,
    VectorMetadata, VectorRecord,
};
use crate::config::Config;
use crate::documents::Chunk;
use crate::{RagError, Result};

/// Client for a Pinecone serverless index.
///
/// Every call goes to the remote index; nothing is cached locally apart from
/// the data-plane host resolved by [`VectorStore::connect_index`].
#[derive(Debug, Clone)]
pub struct VectorStore {
    agent: ureq::Agent,
    api_key: String,
    api_version: String,
    controller_url: String,
    index_name: String,
    dimension: usize,
    metric: String,
    cloud: String,
    region: String,
    upsert_batch_size: usize,
    delete_batch_size: usize,
    scan_limit: usize,
    readiness_delay: Duration,
    metadata_text_limit: usize,
    host: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
}

#[derive(Debug, Deserialize)]
struct UpsertResponse {
    #[serde(default, rename = "upsertedCount")]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<VectorMetadata>,
}

impl VectorStore {
    /// Build a client from configuration without touching the network
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .require_api_key()
            .map_err(|e| RagError::Config(e.to_string()))?
            .to_string();
        let pinecone = &config.pinecone;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(pinecone.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            api_key,
            api_version: pinecone.api_version.clone(),
            controller_url: pinecone.controller_url.trim_end_matches('/').to_string(),
            index_name: pinecone.index_name.clone(),
            dimension: config.ollama.embedding_dimension,
            metric: pinecone.metric.clone(),
            cloud: pinecone.cloud.clone(),
            region: pinecone.region.clone(),
            upsert_batch_size: pinecone.upsert_batch_size.max(1),
            delete_batch_size: pinecone.delete_batch_size.max(1),
            scan_limit: pinecone.scan_limit.max(1),
            readiness_delay: Duration::from_secs(pinecone.readiness_delay_secs),
            metadata_text_limit: pinecone.metadata_text_limit,
            host: None,
        })
    }

    /// Create the index if needed and connect to it
    #[inline]
    pub fn open(config: &Config) -> Result<Self> {
        let mut store = Self::new(config)?;
        store.create_index()?;
        store.connect_index()?;
        Ok(store)
    }

    #[inline]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn scan_limit(&self) -> usize {
        self.scan_limit
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.host.is_some()
    }

    #[inline]
    pub fn list_indexes(&self) -> Result<Vec<IndexDescription>> {
        let url = format!("{}/indexes", self.controller_url);
        let list: IndexList = self.get_json(&url)?;
        debug!("Found {} indexes", list.indexes.len());
        Ok(list.indexes)
    }

    #[inline]
    pub fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let url = format!("{}/indexes/{}", self.controller_url, name);
        self.get_json(&url)
    }

    /// Create the serverless index unless it already exists.
    ///
    /// Returns `true` when a new index was created. There is no readiness
    /// polling; a fixed delay follows creation.
    #[inline]
    pub fn create_index(&self) -> Result<bool> {
        let existing = self.list_indexes()?;
        if existing.iter().any(|index| index.name == self.index_name) {
            info!("Index '{}' already exists", self.index_name);
            return Ok(false);
        }

        info!(
            "Creating index '{}' (dimension {}, metric {}, {}/{})",
            self.index_name, self.dimension, self.metric, self.cloud, self.region
        );

        let url = format!("{}/indexes", self.controller_url);
        let body = json!({
            "name": self.index_name,
            "dimension": self.dimension,
            "metric": self.metric,
            "spec": { "serverless": { "cloud": self.cloud, "region": self.region } }
        });

        let (status, text) = self.post(&url, &body)?;
        if status == 409 {
            info!("Index '{}' was created concurrently", self.index_name);
            return Ok(false);
        }
        check_status(status, &text, "create index")?;

        if !self.readiness_delay.is_zero() {
            debug!("Waiting {}s for index readiness", self.readiness_delay.as_secs());
            std::thread::sleep(self.readiness_delay);
        }

        info!("Index '{}' created", self.index_name);
        Ok(true)
    }

    /// Resolve the data-plane host and log the current vector count
    #[inline]
    pub fn connect_index(&mut self) -> Result<()> {
        let description = self.describe_index(&self.index_name)?;
        let host = description.host.filter(|h| !h.is_empty()).ok_or_else(|| {
            RagError::Database(format!("Index '{}' has no host yet", self.index_name))
        })?;

        self.host = Some(normalize_host(&host));

        let stats = self.describe_stats()?;
        info!(
            "Connected to index '{}' ({} vectors)",
            self.index_name, stats.total_vector_count
        );
        Ok(())
    }

    #[inline]
    pub fn describe_stats(&self) -> Result<IndexStats> {
        let url = self.data_url("/describe_index_stats")?;
        let (status, text) = self.post(&url, &json!({}))?;
        check_status(status, &text, "describe index stats")?;
        parse(&text, "index stats")
    }

    /// Upsert records in fixed-size batches, returning the number written
    #[inline]
    pub fn upsert_records(
        &self,
        records: &[VectorRecord],
        progress: Option<&ProgressBar>,
    ) -> Result<usize> {
        let url = self.data_url("/vectors/upsert")?;
        let mut upserted = 0;

        for batch in records.chunks(self.upsert_batch_size) {
            let (status, text) = self.post(&url, &UpsertRequest { vectors: batch })?;
            check_status(status, &text, "upsert vectors")?;
            let response: UpsertResponse = parse(&text, "upsert response")?;
            upserted += response.upserted_count;

            if let Some(bar) = progress {
                bar.inc(batch.len() as u64);
            }
        }

        info!("Upserted {} vectors into '{}'", upserted, self.index_name);
        Ok(upserted)
    }

    /// Pair chunks with their embeddings and upsert them
    #[inline]
    pub fn upsert_chunks(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        progress: Option<&ProgressBar>,
    ) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::Database(format!(
                "Got {} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| VectorRecord {
                id: chunk.chunk_id.clone(),
                values: values.clone(),
                metadata: VectorMetadata {
                    text: truncate_chars(&chunk.text, self.metadata_text_limit),
                    source: chunk.source.clone(),
                    chunk_index: chunk.chunk_index,
                },
            })
            .collect();

        self.upsert_records(&records, progress)
    }

    /// Top-k nearest chunks by the index metric
    #[inline]
    pub fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchMatch>> {
        let matches = self.query(vector, top_k)?;
        debug!("Search returned {} matches", matches.len());

        Ok(matches
            .into_iter()
            .map(|m| {
                let metadata = m.metadata.unwrap_or_default();
                SearchMatch {
                    id: m.id,
                    score: m.score,
                    text: metadata.text,
                    source: metadata.source,
                }
            })
            .collect())
    }

    /// Enumerate sources by scanning up to `scan_limit` vectors.
    ///
    /// The index has no metadata listing, so a zero-vector query stands in for
    /// a scan; sources keep the order in which their first chunk was seen.
    #[inline]
    pub fn list_sources(&self) -> Result<SourceListing> {
        let stats = self.describe_stats()?;
        let total_vectors = stats.total_vector_count;
        if total_vectors == 0 {
            return Ok(SourceListing::default());
        }

        let top_k = self.scan_limit.min(total_vectors);
        let zero_vector = vec![0.0; self.dimension];
        let matches = self.query(&zero_vector, top_k)?;

        let scanned = matches.len();
        let mut sources: Vec<SourceSummary> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for m in matches {
            let source = m.metadata.unwrap_or_default().source;
            let position = *positions.entry(source.clone()).or_insert_with(|| {
                sources.push(SourceSummary {
                    name: source,
                    chunks: 0,
                    ids: Vec::new(),
                });
                sources.len() - 1
            });

            if let Some(summary) = sources.get_mut(position) {
                summary.chunks += 1;
                summary.ids.push(m.id);
            }
        }

        let truncated = total_vectors > self.scan_limit;
        if truncated {
            warn!(
                "Index holds {} vectors but only {} were scanned; source listing is incomplete",
                total_vectors, self.scan_limit
            );
        }

        Ok(SourceListing {
            sources,
            scanned,
            total_vectors,
            truncated,
        })
    }

    /// Delete every vector the source scan attributes to `name`
    #[inline]
    pub fn delete_by_source(&self, name: &str) -> Result<DeleteOutcome> {
        let listing = self.list_sources()?;

        let Some(summary) = listing.find(name) else {
            info!("No vectors found for source '{}'", name);
            return Ok(DeleteOutcome {
                possibly_incomplete: listing.truncated,
                ..DeleteOutcome::default()
            });
        };

        let deleted = self.delete_ids(&summary.ids)?;
        if listing.truncated {
            warn!(
                "Deleted {} vectors of '{}', but the scan was capped; some may remain",
                deleted, name
            );
        } else {
            info!("Deleted {} vectors of '{}'", deleted, name);
        }

        Ok(DeleteOutcome {
            found: summary.ids.len(),
            deleted,
            possibly_incomplete: listing.truncated,
        })
    }

    /// Delete vectors by id in fixed-size batches
    #[inline]
    pub fn delete_ids(&self, ids: &[String]) -> Result<usize> {
        let url = self.data_url("/vectors/delete")?;
        let mut deleted = 0;

        for batch in ids.chunks(self.delete_batch_size) {
            let (status, text) = self.post(&url, &json!({ "ids": batch }))?;
            check_status(status, &text, "delete vectors")?;
            deleted += batch.len();
        }

        Ok(deleted)
    }

    #[inline]
    pub fn delete_all(&self) -> Result<()> {
        let url = self.data_url("/vectors/delete")?;
        let (status, text) = self.post(&url, &json!({ "deleteAll": true }))?;
        check_status(status, &text, "delete all vectors")?;
        info!("Deleted all vectors from '{}'", self.index_name);
        Ok(())
    }

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let url = self.data_url("/query")?;
        let body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false
        });

        let (status, text) = self.post(&url, &body)?;
        check_status(status, &text, "query")?;
        let response: QueryResponse = parse(&text, "query response")?;
        Ok(response.matches)
    }

    fn data_url(&self, path: &str) -> Result<String> {
        self.host
            .as_ref()
            .map(|host| format!("{host}{path}"))
            .ok_or_else(|| {
                RagError::Database(format!(
                    "Not connected to index '{}'; call connect_index first",
                    self.index_name
                ))
            })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let mut response = self
            .agent
            .get(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
            .call()
            .map_err(|e| RagError::Network(format!("GET {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RagError::Network(format!("Failed to read response body: {e}")))?;

        check_status(status, &text, url)?;
        parse(&text, url)
    }

    fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<(u16, String)> {
        let payload = serde_json::to_string(body)
            .map_err(|e| RagError::Database(format!("Failed to serialize request: {e}")))?;
        debug!("POST {} ({} bytes)", url, payload.len());

        let mut response = self
            .agent
            .post(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
            .header("Content-Type", "application/json")
            .send(&payload)
            .map_err(|e| RagError::Network(format!("POST {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RagError::Network(format!("Failed to read response body: {e}")))?;

        Ok((status, text))
    }
}

fn check_status(status: u16, body: &str, operation: &str) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(RagError::Database(format!(
            "{operation} failed with HTTP {status}: {}",
            body.trim()
        )))
    }
}

fn parse<T: DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| RagError::Database(format!("Invalid {what}: {e}")))
}

/// Data-plane hosts are reported without a scheme
#[inline]
pub fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// First `limit` characters of `text`
#[inline]
pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
