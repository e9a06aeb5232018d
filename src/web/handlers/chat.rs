use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use super::with_session;
use crate::rag::ChatMessage;
use crate::web::errors::ApiError;
use crate::web::presenter::{chat_error_message, present};
use crate::web::state::{AppState, Session, session_id_from_headers};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UserNameRequest {
    pub user_name: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub message: ChatMessage,
    pub processing_time: f64,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub app_name: String,
    pub app_version: String,
    #[serde(flatten)]
    pub session: Session,
}

#[inline]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let (id, session) = state.sessions.resolve(session_id_from_headers(&headers));
    let app = &state.config().app;
    with_session(
        id,
        Json(SessionView {
            app_name: app.name.clone(),
            app_version: app.version.clone(),
            session,
        }),
    )
}

/// Blank names fall back to the configured default
#[inline]
pub async fn set_user_name(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UserNameRequest>,
) -> impl IntoResponse {
    let (id, _) = state.sessions.resolve(session_id_from_headers(&headers));
    let name = payload.user_name.trim();
    let name = if name.is_empty() {
        state.config().app.default_user_name.clone()
    } else {
        name.to_string()
    };

    let session = state.sessions.update(id, |session| {
        session.user_name = name;
        session.clone()
    });
    with_session(id, Json(session))
}

/// Answer a question and append both turns to the session history.
///
/// Pipeline failures become an apologetic assistant message rather than an
/// HTTP error, so the chat always gets a reply.
#[inline]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = payload.message.trim().to_string();
    if question.is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".to_string()));
    }

    let (id, session) = state.sessions.resolve(session_id_from_headers(&headers));
    state
        .sessions
        .update(id, |s| s.messages.push(ChatMessage::user(question.clone())));

    let top_k = payload
        .top_k
        .filter(|k| *k > 0)
        .unwrap_or(state.config().app.default_top_k);
    let worker = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || worker.engine()?.query(&question, top_k, true))
        .await
        .map_err(ApiError::internal)?;

    let phrases = &state.config().app.not_found_phrases;
    let (message, processing_time) = match result {
        Ok(response) => {
            let processing_time = response.processing_time;
            info!(
                "Answered from {} chunks in {:.2}s",
                response.retrieved_chunks, processing_time
            );
            (present(response, &session.user_name, phrases), processing_time)
        }
        Err(e) => {
            error!("Chat query failed: {}", e);
            let content = chat_error_message(&session.user_name, &e.to_string());
            (ChatMessage::assistant(content, Some(Vec::new())), 0.0)
        }
    };

    state
        .sessions
        .update(id, |s| s.messages.push(message.clone()));

    Ok(with_session(
        id,
        Json(ChatReply {
            message,
            processing_time,
        }),
    ))
}

#[inline]
pub async fn clear_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let (id, _) = state.sessions.resolve(session_id_from_headers(&headers));
    let session = state.sessions.update(id, |session| {
        session.messages.clear();
        session.clone()
    });
    with_session(id, Json(session))
}
