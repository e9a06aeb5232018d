// Web module
// Browser chat UI and the JSON API behind it

pub mod errors;
pub mod handlers;
pub mod presenter;
pub mod state;


use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::Result;
use crate::config::Config;
use handlers::{chat, documents};

pub use errors::ApiError;
pub use state::{AppState, Session, SessionStore};

/// Routes for the single-page UI and its API
#[inline]
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config().server.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/session", get(chat::get_session))
        .route("/api/session/name", put(chat::set_user_name))
        .route("/api/chat", post(chat::send_message).delete(chat::clear_chat))
        .route(
            "/api/documents",
            get(documents::list_documents).delete(documents::delete_all),
        )
        .route("/api/documents/upload", post(documents::upload_documents))
        .route("/api/documents/text", post(documents::add_text))
        .route("/api/documents/:name", delete(documents::delete_document))
        .route("/api/refresh", post(documents::refresh))
        .route("/api/stats", get(documents::statistics))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the UI until the process is stopped
#[inline]
pub async fn serve(config: Config, host: &str, port: u16) -> Result<()> {
    config.ensure_data_dirs()?;

    let state = Arc::new(AppState::new(config));
    let app = router(state);

    let listener = TcpListener::bind((host, port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    eprintln!("🌐 Open http://{host}:{port} in your browser");

    axum::serve(listener, app).await?;
    Ok(())
}
