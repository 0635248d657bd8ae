//! Application state for the chat RAG server

use dashmap::DashMap;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::conversation::ConversationSession;
use crate::error::{Error, Result};
use crate::pipeline::RagPipeline;

/// Session handle; the mutex serializes turns of one session
pub type SessionHandle = Arc<Mutex<ConversationSession>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Retrieval-and-grounding pipeline
    pipeline: Arc<RagPipeline>,
    /// Live conversation sessions
    sessions: DashMap<Uuid, SessionHandle>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create new application state, building providers from configuration
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing chat RAG state (store: {:?}, generation: {:?})...",
            config.store.backend,
            config.llm.backend
        );

        let pipeline = Arc::new(RagPipeline::from_config(&config).await?);

        match pipeline.store().count().await {
            Ok(count) => tracing::info!("Passage store holds {} passages", count),
            Err(e) => tracing::warn!("Could not count stored passages: {}", e),
        }

        let state = Self::with_pipeline(config, pipeline);
        state.set_ready(true);
        Ok(state)
    }

    /// Create state around an existing pipeline
    pub fn with_pipeline(config: RagConfig, pipeline: Arc<RagPipeline>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                sessions: DashMap::new(),
                ready: RwLock::new(false),
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        &self.inner.pipeline
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }

    /// Start a new session and return its id
    pub fn create_session(&self) -> Uuid {
        let session = ConversationSession::new(self.inner.config.conversation.history_capacity);
        let id = session.id;
        self.inner
            .sessions
            .insert(id, Arc::new(Mutex::new(session)));
        tracing::debug!("Created session {}", id);
        id
    }

    /// Look up a session
    pub fn session(&self, id: &Uuid) -> Result<SessionHandle> {
        self.inner
            .sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Drop a session and its history
    pub fn remove_session(&self, id: &Uuid) -> Result<()> {
        self.inner
            .sessions
            .remove(id)
            .map(|_| tracing::debug!("Removed session {}", id))
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Run a future under the configured request timeout
    pub async fn with_timeout<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let secs = self.inner.config.server.request_timeout_secs;
        tokio::time::timeout(Duration::from_secs(secs), future)
            .await
            .map_err(|_| {
                tracing::warn!("Request timed out after {}s", secs);
                Error::Timeout(secs)
            })?
    }
}
