use anyhow::Context;
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::Config;
use crate::database::VectorStore;
use crate::documents::{ChunkCache, ChunkStats};
use crate::embeddings::OllamaClient;
use crate::indexer::{DocumentIndexer, IngestReport};
use crate::llm::LlmClient;
use crate::rag::RagEngine;
use crate::{RagError, Result};

fn load_config() -> Result<Config> {
    let config = Config::load_default()?;
    config.ensure_data_dirs()?;
    Ok(config)
}

fn embedding_bar() -> ProgressBar {
    if console::user_attended_stderr() {
        ProgressBar::new(0).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks {wide_bar}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    }
}

fn print_report(report: &IngestReport) {
    println!("{}", style(format!("✓ {}", report.message())).green());
    println!("  Files processed: {}", report.processed.len());
    for name in &report.processed {
        println!("    📄 {}", name);
    }
    if !report.skipped.is_empty() {
        println!("  Skipped (missing or no text): {}", report.skipped.len());
        for path in &report.skipped {
            println!("    ⚠️  {}", path.display());
        }
    }
    println!("  Vectors upserted: {}", report.upserted);
}

/// Ingest every supported file in `dir` (the raw documents directory by default)
#[inline]
pub fn ingest_directory(dir: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let dir = dir.unwrap_or_else(|| config.raw_documents_dir());

    println!("Processing documents in {}", style(dir.display()).cyan());

    let bar = embedding_bar();
    let indexer = DocumentIndexer::new(&config)?.with_progress(bar.clone());
    let report = indexer.process_directory(&dir);
    bar.finish_and_clear();
    let report = report?;

    print_report(&report);

    let chunks = ChunkCache::new(config.chunk_cache_path()).load()?;
    if let Some(stats) = ChunkStats::from_chunks(&chunks) {
        println!();
        println!("Chunk statistics:");
        println!("  Total chunks: {}", stats.total_chunks);
        println!("  Sources: {}", stats.total_sources);
        println!("  Average length: {:.0} chars", stats.avg_chunk_length);
        println!(
            "  Shortest / longest: {} / {} chars",
            stats.min_chunk_length, stats.max_chunk_length
        );
    }

    Ok(())
}

/// Copy files into the raw documents directory and ingest them
#[inline]
pub fn add_files(files: &[PathBuf]) -> Result<()> {
    let config = load_config()?;
    let bar = embedding_bar();
    let indexer = DocumentIndexer::new(&config)?.with_progress(bar.clone());

    let mut saved = Vec::with_capacity(files.len());
    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| RagError::Document(format!("Not a file: {}", file.display())))?;
        let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        saved.push(indexer.save_upload(&name, &bytes)?);
    }

    let report = indexer.process_files(&saved);
    bar.finish_and_clear();
    print_report(&report?);
    Ok(())
}

/// Store pasted text, read from `file` or standard input
#[inline]
pub fn add_text(title: &str, file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read text from stdin")?;
            buffer
        }
    };

    let config = load_config()?;
    let indexer = DocumentIndexer::new(&config)?;
    let (path, report) = indexer.store_text(title, &text)?;

    println!("Saved as {}", style(path.display()).cyan());
    print_report(&report);
    Ok(())
}

#[inline]
pub fn ask(question: &str, top_k: Option<usize>) -> Result<()> {
    let config = load_config()?;
    let engine = RagEngine::new(&config)?;
    let top_k = top_k.filter(|k| *k > 0).unwrap_or(engine.default_top_k());

    let response = engine.query(question, top_k, true)?;

    println!("{}", style("Answer:").bold().cyan());
    println!("{}", response.answer);
    println!();

    if response.no_results {
        println!("{}", style("No matching chunks in the knowledge base.").yellow());
    } else {
        println!("{}", style("Sources:").bold());
        for (i, source) in response.sources.iter().enumerate() {
            println!(
                "  {}. {} (score: {:.3})",
                i + 1,
                source.source,
                source.score
            );
        }
    }

    println!(
        "{}",
        style(format!(
            "{} chunks retrieved in {:.2}s",
            response.retrieved_chunks, response.processing_time
        ))
        .dim()
    );
    Ok(())
}

#[inline]
pub fn list_documents() -> Result<()> {
    let config = load_config()?;
    let mut store = VectorStore::new(&config)?;
    store.connect_index()?;
    let listing = store.list_sources()?;

    if listing.sources.is_empty() {
        println!("No documents in the collection.");
        println!("Use 'docs-rag add <FILES>' or 'docs-rag ingest' to add some.");
        return Ok(());
    }

    println!("Documents ({} total):", listing.sources.len());
    println!();
    for source in &listing.sources {
        println!("📄 {} ({} chunks)", source.name, source.chunks);
    }
    println!();
    println!("Total chunks: {}", listing.total_chunks());

    if listing.truncated {
        println!(
            "{}",
            style(format!(
                "⚠️  Only {} of {} vectors were scanned; the list may be incomplete",
                listing.scanned, listing.total_vectors
            ))
            .yellow()
        );
    }
    Ok(())
}

#[inline]
pub fn delete_document(source: &str) -> Result<()> {
    let config = load_config()?;
    let indexer = DocumentIndexer::new(&config)?;
    let outcome = indexer.delete_document(source)?;

    if outcome.found == 0 {
        println!("Document not found: {}", source);
        if outcome.possibly_incomplete {
            println!(
                "{}",
                style("The index is larger than one scan; the document may still exist.").yellow()
            );
        }
        return Ok(());
    }

    println!(
        "{}",
        style(format!("✓ Deleted {} ({} chunks)", source, outcome.deleted)).green()
    );
    if outcome.possibly_incomplete {
        println!(
            "{}",
            style("⚠️  The scan was capped; some chunks of this document may remain.").yellow()
        );
    }
    Ok(())
}

#[inline]
pub fn delete_all(skip_confirmation: bool) -> Result<()> {
    let config = load_config()?;

    if !skip_confirmation {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete ALL documents from index '{}'?",
                config.pinecone.index_name
            ))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let mut store = VectorStore::new(&config)?;
    store.connect_index()?;
    store.delete_all()?;
    println!("{}", style("✓ All documents deleted").green());
    Ok(())
}

/// Connectivity and model report for Ollama and Pinecone
#[inline]
pub fn show_status() -> Result<()> {
    let config = Config::load_default().unwrap_or_default();

    println!("📊 {} v{} Status Report", config.app.name, config.app.version);
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Embedding model: {}", config.ollama.embedding_model);
            }
            Err(e) => println!("   ⚠️  Ollama: Connected but unhealthy - {:#}", e),
        },
        Err(e) => println!("   ❌ Ollama: Failed to connect - {}", e),
    }

    match LlmClient::new(&config) {
        Ok(llm) if llm.check_model_availability() => {
            println!("   ✅ LLM model: {}", llm.model());
        }
        Ok(llm) => {
            println!("   ⚠️  LLM model {} is not pulled", llm.model());
            println!("      Run: ollama pull {}", llm.model());
        }
        Err(e) => println!("   ❌ LLM: {}", e),
    }

    println!();
    println!("🔍 Vector Database Status:");
    match VectorStore::new(&config) {
        Ok(mut store) => match store.connect_index() {
            Ok(()) => match store.describe_stats() {
                Ok(stats) => {
                    println!("   ✅ Pinecone: Connected to '{}'", store.index_name());
                    println!("   📊 Vectors: {}", stats.total_vector_count);
                    println!("   📐 Dimension: {}", store.dimension());
                }
                Err(e) => println!("   ⚠️  Pinecone: Connected but stats failed - {}", e),
            },
            Err(e) => {
                println!(
                    "   ⚠️  Pinecone: Index '{}' unavailable - {}",
                    store.index_name(),
                    e
                );
                println!("      Run 'docs-rag ingest' to create it");
            }
        },
        Err(e) => println!("   ❌ Pinecone: {}", e),
    }

    println!();
    println!("📁 Local Data:");
    println!("   Raw documents: {}", config.raw_documents_dir().display());
    match ChunkCache::new(config.chunk_cache_path()).load() {
        Ok(chunks) => match ChunkStats::from_chunks(&chunks) {
            Some(stats) => println!(
                "   Last ingest: {} chunks from {} sources",
                stats.total_chunks, stats.total_sources
            ),
            None => println!("   Last ingest: none"),
        },
        Err(e) => {
            error!("Failed to read chunk cache: {:#}", e);
            println!("   Last ingest: unreadable cache - {:#}", e);
        }
    }

    Ok(())
}

#[inline]
pub async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_config()?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info!("Starting web UI on {}:{}", host, port);
    crate::web::serve(config, &host, port).await
}
