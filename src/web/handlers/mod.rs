pub mod chat;
pub mod documents;

use axum::http::{HeaderMap, header};
use axum::response::{Html, IntoResponse};

use super::errors::ApiError;
use super::state::session_cookie;
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[inline]
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Run a blocking pipeline call off the async workers
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
}

/// Attach the session cookie to a response
pub(crate) fn with_session(id: Uuid, body: impl IntoResponse) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    if let Ok(value) = session_cookie(id).parse() {
        headers.insert(header::SET_COOKIE, value);
    }
    (headers, body)
}
