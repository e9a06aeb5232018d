
use axum::http::{HeaderMap, header};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::Result;
use crate::config::Config;
use crate::database::VectorStore;
use crate::embeddings::Embedder;
use crate::indexer::DocumentIndexer;
use crate::rag::{ChatMessage, RagEngine};

pub const SESSION_COOKIE: &str = "docs_rag_session";

/// Per-browser chat state
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Session {
    pub user_name: String,
    pub messages: Vec<ChatMessage>,
}

/// Sessions untouched for this long are dropped on the next write
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct SessionEntry {
    session: Session,
    last_seen: Instant,
}

/// In-process session map keyed by the session cookie.
///
/// Reading never stores anything: a session is only kept once a handler
/// writes to it through `update`, and idle sessions are evicted then.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    default_user_name: String,
    idle_timeout: Duration,
}

impl SessionStore {
    #[inline]
    pub fn new(default_user_name: impl Into<String>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            default_user_name: default_user_name.into(),
            idle_timeout: SESSION_IDLE_TIMEOUT,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn fresh(&self) -> Session {
        Session {
            user_name: self.default_user_name.clone(),
            messages: Vec::new(),
        }
    }

    /// Snapshot of the session behind `id`.
    ///
    /// An unknown or expired id keeps its value and reads as a fresh session;
    /// without an id a new one is minted. Nothing is inserted either way.
    #[inline]
    pub fn resolve(&self, id: Option<Uuid>) -> (Uuid, Session) {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(id) = id else {
            let id = Uuid::new_v4();
            debug!("New session {}", id);
            return (id, self.fresh());
        };

        let session = sessions
            .get(&id)
            .filter(|entry| entry.last_seen.elapsed() < self.idle_timeout)
            .map_or_else(|| self.fresh(), |entry| entry.session.clone());
        (id, session)
    }

    /// Apply `f` to the session behind `id`, storing it if needed
    #[inline]
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);

        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < self.idle_timeout);
        if sessions.len() < before {
            debug!("Evicted {} idle sessions", before - sessions.len());
        }

        let entry = sessions.entry(id).or_insert_with(|| SessionEntry {
            session: self.fresh(),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        f(&mut entry.session)
    }

    /// Sessions currently stored, expired ones included until the next write
    #[inline]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared state behind every handler.
///
/// The embedder is loaded on first use. The engine is rebuilt whenever the
/// cached one has no index connection, so an index created by a later upload
/// is picked up without a restart.
pub struct AppState {
    config: Config,
    embedder: OnceLock<Arc<Embedder>>,
    engine: Mutex<Option<Arc<RagEngine>>>,
    pub sessions: SessionStore,
}

impl AppState {
    #[inline]
    pub fn new(config: Config) -> Self {
        let sessions = SessionStore::new(config.app.default_user_name.clone());
        Self {
            config,
            embedder: OnceLock::new(),
            engine: Mutex::new(None),
            sessions,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn embedder(&self) -> Result<Arc<Embedder>> {
        if let Some(embedder) = self.embedder.get() {
            return Ok(Arc::clone(embedder));
        }

        let loaded = Arc::new(Embedder::load(&self.config)?);
        Ok(Arc::clone(self.embedder.get_or_init(|| loaded)))
    }

    /// Blocking: may load the embedder and connect to the index
    #[inline]
    pub fn engine(&self) -> Result<Arc<RagEngine>> {
        let mut cached = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = cached.as_ref().filter(|e| e.store().is_connected()) {
            return Ok(Arc::clone(engine));
        }

        let engine = Arc::new(RagEngine::with_embedder(&self.config, self.embedder()?)?);
        *cached = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Drop the cached engine so the next request reconnects
    #[inline]
    pub fn refresh(&self) {
        info!("Refreshing RAG engine");
        *self.engine.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Blocking: may load the embedder
    #[inline]
    pub fn indexer(&self) -> Result<DocumentIndexer> {
        let store = VectorStore::new(&self.config)?;
        Ok(DocumentIndexer::from_parts(
            &self.config,
            self.embedder()?,
            store,
        ))
    }
}

/// Session id carried by the request's cookie header, if any
#[inline]
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

#[inline]
pub fn session_cookie(id: Uuid) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}
