use axum::Json;
use axum::extract::{Multipart, Path, State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::blocking;
use crate::database::{DeleteOutcome, SourceListing};
use crate::indexer::IngestReport;
use crate::rag::EngineStatistics;
use crate::web::errors::ApiError;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TextDocumentRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DocumentEntry {
    pub name: String,
    pub chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct DocumentsView {
    pub documents: Vec<DocumentEntry>,
    pub total_documents: usize,
    pub total_chunks: usize,
    pub total_vectors: usize,
    /// The listing came from a capped scan and may be missing documents
    pub truncated: bool,
}

impl From<SourceListing> for DocumentsView {
    #[inline]
    fn from(listing: SourceListing) -> Self {
        let total_chunks = listing.total_chunks();
        let documents: Vec<DocumentEntry> = listing
            .sources
            .into_iter()
            .map(|s| DocumentEntry {
                name: s.name,
                chunks: s.chunks,
            })
            .collect();

        Self {
            total_documents: documents.len(),
            documents,
            total_chunks,
            total_vectors: listing.total_vectors,
            truncated: listing.truncated,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IngestView {
    pub message: String,
    pub files: Vec<String>,
    pub skipped: Vec<String>,
    pub chunks: usize,
}

impl From<IngestReport> for IngestView {
    #[inline]
    fn from(report: IngestReport) -> Self {
        Self {
            message: report.message(),
            skipped: report
                .skipped
                .iter()
                .map(|p| {
                    p.file_name()
                        .map_or_else(|| p.display().to_string(), |n| n.to_string_lossy().into_owned())
                })
                .collect(),
            files: report.processed,
            chunks: report.chunks,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteView {
    pub name: String,
    #[serde(flatten)]
    pub outcome: DeleteOutcome,
}

#[inline]
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DocumentsView>, ApiError> {
    let listing = blocking(move || Ok(state.engine()?.documents())).await?;
    Ok(Json(listing.into()))
}

#[inline]
pub async fn statistics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EngineStatistics>, ApiError> {
    let stats = blocking(move || state.engine()?.statistics()).await?;
    Ok(Json(stats))
}

/// Save every uploaded file, then ingest them as one batch
#[inline]
pub async fn upload_documents(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<IngestView>, ApiError> {
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read {name}: {e}")))?;
        files.push((name, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files were uploaded".to_string()));
    }
    info!("Received {} uploaded files", files.len());

    let worker = Arc::clone(&state);
    let report = blocking(move || {
        let indexer = worker.indexer()?;
        let mut paths = Vec::with_capacity(files.len());
        for (name, bytes) in &files {
            paths.push(indexer.save_upload(name, bytes)?);
        }
        indexer.process_files(&paths)
    })
    .await?;

    state.refresh();
    Ok(Json(report.into()))
}

#[inline]
pub async fn add_text(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TextDocumentRequest>,
) -> Result<Json<IngestView>, ApiError> {
    let worker = Arc::clone(&state);
    let (path, report) = blocking(move || {
        worker
            .indexer()?
            .store_text(&payload.title, &payload.content)
    })
    .await?;

    info!("Stored text document {}", path.display());
    state.refresh();
    Ok(Json(report.into()))
}

#[inline]
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<DeleteView>, ApiError> {
    let worker = Arc::clone(&state);
    let source = name.clone();
    let outcome = blocking(move || worker.indexer()?.delete_document(&source)).await?;

    if outcome.found == 0 {
        return Err(ApiError::NotFound(format!("Document not found: {name}")));
    }
    if outcome.possibly_incomplete {
        warn!("Deletion of {} may be incomplete", name);
    }

    state.refresh();
    Ok(Json(DeleteView { name, outcome }))
}

#[inline]
pub async fn delete_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let worker = Arc::clone(&state);
    blocking(move || worker.engine()?.delete_all()).await?;
    state.refresh();
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Forget the cached engine so the next request reconnects to the index
#[inline]
pub async fn refresh(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.refresh();
    Json(serde_json::json!({ "refreshed": true }))
}
