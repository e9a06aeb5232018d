// Indexer module
// Turns raw documents into chunk vectors in the index and keeps the raw directory in step

#[cfg(test)]
mod tests;

use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use indicatif::ProgressBar;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::{DeleteOutcome, VectorStore};
use crate::documents::{Chunk, ChunkCache, RecursiveSplitter, is_supported, load_document};
use crate::embeddings::Embedder;
use crate::{RagError, Result};

pub const MIN_TEXT_CHARS: usize = 10;

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Files that produced at least one chunk
    pub processed: Vec<String>,
    /// Files that were missing or yielded no text
    pub skipped: Vec<PathBuf>,
    pub chunks: usize,
    pub upserted: usize,
}

impl IngestReport {
    #[inline]
    pub fn message(&self) -> String {
        format!("Successfully processed {} chunks", self.chunks)
    }
}

/// Loads, chunks, embeds and upserts documents
pub struct DocumentIndexer {
    embedder: Arc<Embedder>,
    store: VectorStore,
    splitter: RecursiveSplitter,
    raw_dir: PathBuf,
    cache: ChunkCache,
    progress: Option<ProgressBar>,
}

impl DocumentIndexer {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let embedder = Embedder::shared(config)?;
        let store = VectorStore::new(config)?;
        Ok(Self::from_parts(config, embedder, store))
    }

    #[inline]
    pub fn from_parts(config: &Config, embedder: Arc<Embedder>, store: VectorStore) -> Self {
        Self {
            embedder,
            store,
            splitter: RecursiveSplitter::new(&config.chunking),
            raw_dir: config.raw_documents_dir(),
            cache: ChunkCache::new(config.chunk_cache_path()),
            progress: None,
        }
    }

    /// Report embedding progress on `bar`; its length is set per run
    #[inline]
    #[must_use]
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    #[inline]
    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    #[inline]
    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// Ingest the given files.
    ///
    /// Files that are missing or produce no text are skipped; the run fails
    /// only when none of them produced a chunk.
    #[inline]
    pub fn process_files(&self, paths: &[PathBuf]) -> Result<IngestReport> {
        let (report, _) = self.ingest(paths)?;
        Ok(report)
    }

    /// Ingest every supported file in `dir` and rewrite the chunk cache
    #[inline]
    pub fn process_directory(&self, dir: &Path) -> Result<IngestReport> {
        let paths = collect_documents(dir)?;
        if paths.is_empty() {
            return Err(RagError::Document(format!(
                "No supported documents found in {}",
                dir.display()
            )));
        }

        info!("Found {} documents in {}", paths.len(), dir.display());
        let (report, chunks) = self.ingest(&paths)?;
        self.cache.save(&chunks)?;
        Ok(report)
    }

    /// Save pasted text into the raw directory, then ingest it
    #[inline]
    pub fn store_text(&self, title: &str, text: &str) -> Result<(PathBuf, IngestReport)> {
        validate_text_document(title, text)?;

        fs::create_dir_all(&self.raw_dir)
            .with_context(|| format!("Failed to create {}", self.raw_dir.display()))?;
        let path = self
            .raw_dir
            .join(text_document_filename(title, Local::now().naive_local()));
        fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Saved text document to {}", path.display());

        let report = self.process_files(&[path.clone()])?;
        Ok((path, report))
    }

    /// Write uploaded bytes into the raw directory under the file-name part of `name`
    #[inline]
    pub fn save_upload(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let file_name = upload_file_name(name)
            .ok_or_else(|| RagError::Document(format!("Invalid file name: {name}")))?;
        let path = self.raw_dir.join(&file_name);
        if !is_supported(&path) {
            return Err(RagError::Document(format!(
                "Unsupported file type: {file_name}"
            )));
        }

        fs::create_dir_all(&self.raw_dir)
            .with_context(|| format!("Failed to create {}", self.raw_dir.display()))?;
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved upload {} ({} bytes)", file_name, bytes.len());
        Ok(path)
    }

    /// Delete a document's vectors, then its raw file.
    ///
    /// Never creates the index, and leaves the raw file alone when no vectors
    /// were attributed to `source`.
    #[inline]
    pub fn delete_document(&self, source: &str) -> Result<DeleteOutcome> {
        let mut store = self.store.clone();
        store.connect_index()?;
        let outcome = store.delete_by_source(source)?;

        if outcome.found == 0 {
            info!("No vectors found for {}, keeping raw file", source);
            return Ok(outcome);
        }

        if let Some(file_name) = upload_file_name(source) {
            let path = self.raw_dir.join(file_name);
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                info!("Removed raw file {}", path.display());
            }
        }

        Ok(outcome)
    }

    fn ingest(&self, paths: &[PathBuf]) -> Result<(IngestReport, Vec<Chunk>)> {
        let mut report = IngestReport::default();
        let mut all_chunks = Vec::new();

        for path in paths {
            let Some(source) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                report.skipped.push(path.clone());
                continue;
            };
            if !path.exists() {
                warn!("Skipping missing file {}", path.display());
                report.skipped.push(path.clone());
                continue;
            }

            let text = load_document(path);
            if text.trim().is_empty() {
                warn!("No text extracted from {}", path.display());
                report.skipped.push(path.clone());
                continue;
            }

            let chunks = self.splitter.chunk_document(&text, &source);
            debug!("{}: {} chunks", source, chunks.len());
            all_chunks.extend(chunks);
            report.processed.push(source);
        }

        if all_chunks.is_empty() {
            return Err(RagError::Document(
                "No text could be extracted from the documents".to_string(),
            ));
        }

        let texts: Vec<String> = all_chunks.iter().map(|c| c.text.clone()).collect();
        if let Some(bar) = &self.progress {
            bar.set_length(texts.len() as u64);
            bar.set_position(0);
        }
        let embeddings = self.embedder.embed_batch(&texts, self.progress.as_ref())?;

        let store = self.connected_store()?;
        report.upserted = store.upsert_chunks(&all_chunks, &embeddings, None)?;
        report.chunks = all_chunks.len();

        info!(
            "Ingested {} chunks from {} files ({} skipped)",
            report.chunks,
            report.processed.len(),
            report.skipped.len()
        );
        Ok((report, all_chunks))
    }

    // Ingest creates the index on first use
    fn connected_store(&self) -> Result<VectorStore> {
        let mut store = self.store.clone();
        store.create_index()?;
        store.connect_index()?;
        Ok(store)
    }
}

/// Supported files directly inside `dir`, sorted by name
#[inline]
pub fn collect_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.context("Failed to read directory entry")?.path();
        if path.is_file() && is_supported(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// A title is required and the content needs ten non-blank characters
#[inline]
pub fn validate_text_document(title: &str, text: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(RagError::Document(
            "Please provide a title for your text content".to_string(),
        ));
    }
    if text.trim().chars().count() < MIN_TEXT_CHARS {
        return Err(RagError::Document(format!(
            "Please provide some text content (at least {MIN_TEXT_CHARS} characters)"
        )));
    }
    Ok(())
}

/// Keep alphanumerics, spaces, dashes and underscores; anything else becomes `_`
#[inline]
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[inline]
pub fn text_document_filename(title: &str, at: NaiveDateTime) -> String {
    format!("{}_{}.txt", safe_title(title), at.format("%Y%m%d_%H%M%S"))
}

/// Last path component of an uploaded name, ignoring any directories it carries
#[inline]
pub fn upload_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." {
        None
    } else {
        Some(last.to_string())
    }
}
