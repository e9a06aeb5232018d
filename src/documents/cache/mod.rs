#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::chunking::Chunk;

/// JSON snapshot of the most recent ingestion.
///
/// The vector index is authoritative; this file only records what the last
/// directory ingest produced and is never read back into the index.
#[derive(Debug, Clone)]
pub struct ChunkCache {
    path: PathBuf,
}

impl ChunkCache {
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn save(&self, chunks: &[Chunk]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(chunks).context("Failed to serialize chunks")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write chunk cache: {}", self.path.display()))?;

        info!("Saved {} chunks to {}", chunks.len(), self.path.display());
        Ok(())
    }

    /// Returns an empty list when nothing has been cached yet
    #[inline]
    pub fn load(&self) -> Result<Vec<Chunk>> {
        if !self.path.exists() {
            warn!("No processed chunks found at {}", self.path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read chunk cache: {}", self.path.display()))?;
        let chunks: Vec<Chunk> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse chunk cache: {}", self.path.display()))?;

        info!("Loaded {} chunks from cache", chunks.len());
        Ok(chunks)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChunkStats {
    pub total_chunks: usize,
    pub total_sources: usize,
    pub sources: Vec<String>,
    pub avg_chunk_length: f64,
    pub min_chunk_length: usize,
    pub max_chunk_length: usize,
}

impl ChunkStats {
    /// `None` for an empty chunk list
    #[inline]
    pub fn from_chunks(chunks: &[Chunk]) -> Option<Self> {
        let lengths: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        let (min_chunk_length, max_chunk_length) = lengths.iter().copied().minmax().into_option()?;

        let sources: Vec<String> = chunks
            .iter()
            .map(|c| c.source.as_str())
            .unique()
            .sorted_unstable()
            .map(str::to_string)
            .collect();

        let avg_chunk_length = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;

        Some(Self {
            total_chunks: chunks.len(),
            total_sources: sources.len(),
            sources,
            avg_chunk_length,
            min_chunk_length,
            max_chunk_length,
        })
    }
}
