// Retrieval-augmented generation
// Embeds a question, retrieves the closest chunks and asks the LLM to answer from them


use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::config::Config;
use crate::database::{DeleteOutcome, SearchMatch, SourceListing, VectorStore};
use crate::embeddings::Embedder;
use crate::llm::LlmClient;

/// Answer returned when the index has nothing close to the question
pub const NO_RESULTS_MESSAGE: &str = "I couldn't find any relevant information in the knowledge base to answer your question. Please check if the relevant documents have been uploaded to the collection.";

pub const NO_USER_MESSAGE: &str = "No user message found.";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SearchMatch>,
    pub retrieved_chunks: usize,
    /// Wall-clock seconds spent answering
    pub processing_time: f64,
    /// True when retrieval found nothing and the LLM was not consulted
    pub no_results: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SearchMatch>>,
}

impl ChatMessage {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>, sources: Option<Vec<SearchMatch>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EngineStatistics {
    pub total_vectors: usize,
    pub index_name: String,
    pub dimension: usize,
    pub embedding_model: String,
    pub llm_model: String,
}

pub struct RagEngine {
    embedder: Arc<Embedder>,
    store: VectorStore,
    llm: LlmClient,
    default_top_k: usize,
}

impl RagEngine {
    /// Load the shared embedder and connect to the configured index
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_embedder(config, Embedder::shared(config)?)
    }

    #[inline]
    pub fn with_embedder(config: &Config, embedder: Arc<Embedder>) -> Result<Self> {
        info!("Initializing RAG engine");

        let mut store = VectorStore::new(config)?;
        if let Err(e) = store.connect_index() {
            warn!("Could not connect to index yet: {}", e);
        }
        let llm = LlmClient::new(config)?;

        Ok(Self::from_parts(
            embedder,
            store,
            llm,
            config.app.default_top_k,
        ))
    }

    #[inline]
    pub fn from_parts(
        embedder: Arc<Embedder>,
        store: VectorStore,
        llm: LlmClient,
        default_top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            llm,
            default_top_k: default_top_k.max(1),
        }
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn llm(&self) -> &LlmClient {
        &self.llm
    }

    #[inline]
    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Answer `question` from the `top_k` closest chunks.
    ///
    /// Embedding and search failures are returned as errors; generation
    /// failures are already folded into the answer text by the LLM client.
    #[inline]
    pub fn query(&self, question: &str, top_k: usize, return_sources: bool) -> Result<QueryResponse> {
        let start = Instant::now();
        debug!("Query: {}", question);

        let query_embedding = self.embedder.embed_text(question)?;
        let matches = self.store.search(&query_embedding, top_k)?;

        if matches.is_empty() {
            info!("No relevant chunks found");
            return Ok(QueryResponse {
                answer: NO_RESULTS_MESSAGE.to_string(),
                sources: Vec::new(),
                retrieved_chunks: 0,
                processing_time: start.elapsed().as_secs_f64(),
                no_results: true,
            });
        }

        for (i, m) in matches.iter().enumerate() {
            debug!("  {}. {} (score: {:.3})", i + 1, m.source, m.score);
        }

        let contexts: Vec<String> = matches.iter().map(|m| m.text.clone()).collect();
        let answer = self.llm.generate_response(&contexts, question);
        let retrieved_chunks = matches.len();
        let processing_time = start.elapsed().as_secs_f64();

        info!(
            "Answered from {} chunks in {:.2}s",
            retrieved_chunks, processing_time
        );

        Ok(QueryResponse {
            answer,
            sources: if return_sources { matches } else { Vec::new() },
            retrieved_chunks,
            processing_time,
            no_results: false,
        })
    }

    /// Answer the most recent user message; earlier turns are not used as context
    #[inline]
    pub fn chat(&self, messages: &[ChatMessage], top_k: usize) -> Result<QueryResponse> {
        let Some(last_user) = messages.iter().rev().find(|m| m.role == Role::User) else {
            return Ok(QueryResponse {
                answer: NO_USER_MESSAGE.to_string(),
                sources: Vec::new(),
                retrieved_chunks: 0,
                processing_time: 0.0,
                no_results: false,
            });
        };

        self.query(&last_user.content, top_k, true)
    }

    #[inline]
    pub fn statistics(&self) -> Result<EngineStatistics> {
        let stats = self.store.describe_stats()?;
        Ok(EngineStatistics {
            total_vectors: stats.total_vector_count,
            index_name: self.store.index_name().to_string(),
            dimension: self.embedder.dimension(),
            embedding_model: self.embedder.model_name().to_string(),
            llm_model: self.llm.model().to_string(),
        })
    }

    /// Indexed documents; failures are logged and yield an empty listing
    #[inline]
    pub fn documents(&self) -> SourceListing {
        self.store.list_sources().unwrap_or_else(|e| {
            error!("Error getting documents: {}", e);
            SourceListing::default()
        })
    }

    /// Remove a document's vectors, reporting whether anything was deleted
    #[inline]
    pub fn delete_document(&self, source: &str) -> bool {
        match self.delete_document_outcome(source) {
            Ok(outcome) => outcome.is_deleted(),
            Err(e) => {
                error!("Error deleting document {}: {}", source, e);
                false
            }
        }
    }

    #[inline]
    pub fn delete_document_outcome(&self, source: &str) -> Result<DeleteOutcome> {
        self.store.delete_by_source(source)
    }

    #[inline]
    pub fn delete_all(&self) -> Result<()> {
        self.store.delete_all()
    }
}
