
use indicatif::ProgressBar;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use super::ollama::OllamaClient;
use crate::config::Config;
use crate::{RagError, Result};

static SHARED_EMBEDDER: OnceLock<Arc<Embedder>> = OnceLock::new();

/// Sentence embedder backed by the configured Ollama embedding model
#[derive(Debug)]
pub struct Embedder {
    client: OllamaClient,
    dimension: usize,
}

impl Embedder {
    /// Connect to the model and confirm it produces vectors of the configured size
    #[inline]
    pub fn load(config: &Config) -> Result<Self> {
        let client = OllamaClient::new(config)?;
        let dimension = config.ollama.embedding_dimension;

        info!("Loading embedding model: {}", client.model());

        let probe = client
            .embed(&["dimension probe".to_string()])
            .map_err(|e| RagError::Embedding(format!("Failed to load embedding model: {e:#}")))?;

        let actual = probe.first().map_or(0, Vec::len);
        if actual != dimension {
            return Err(RagError::Embedding(format!(
                "Model {} produces {}-dimensional vectors, expected {}",
                client.model(),
                actual,
                dimension
            )));
        }

        info!("Embedding model loaded (dimension: {})", dimension);
        Ok(Self { client, dimension })
    }

    /// Process-wide instance; the first call loads the model and later calls reuse it
    #[inline]
    pub fn shared(config: &Config) -> Result<Arc<Self>> {
        if let Some(embedder) = SHARED_EMBEDDER.get() {
            return Ok(Arc::clone(embedder));
        }

        let loaded = Arc::new(Self::load(config)?);
        Ok(Arc::clone(SHARED_EMBEDDER.get_or_init(|| loaded)))
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        self.client.model()
    }

    #[inline]
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.client
            .embed(&[text.to_string()])
            .map_err(|e| RagError::Embedding(format!("{e:#}")))?
            .pop()
            .ok_or_else(|| RagError::Embedding("Empty embedding response".to_string()))
    }

    /// Embed texts in groups of the configured batch size, in input order
    #[inline]
    pub fn embed_batch(
        &self,
        texts: &[String],
        progress: Option<&ProgressBar>,
    ) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.client.batch_size().max(1)) {
            let vectors = self.client.embed(batch).map_err(|e| {
                RagError::Embedding(format!(
                    "Failed to embed batch of {} texts: {e:#}",
                    batch.len()
                ))
            })?;
            embeddings.extend(vectors);

            if let Some(bar) = progress {
                bar.inc(batch.len() as u64);
            }
        }

        debug!("Embedded {} texts", embeddings.len());
        Ok(embeddings)
    }
}

/// Cosine similarity of two vectors; zero when either has no magnitude
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
