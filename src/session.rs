//! Chat sessions.
//!
//! A [`Session`] owns at most one current [`Index`] and exactly one
//! [`ConversationMemory`], both behind a single async mutex:
//!
//! - `ask` holds the lock for the whole exchange, so questions within one
//!   session are answered strictly one after another.
//! - `ingest` builds the new index **without** the lock, then takes it only
//!   to swap in the new index and an empty memory together. Concurrent
//!   askers see either the old corpus with its history or the new corpus
//!   with a fresh history, never a mix.
//!
//! A session never transitions back to "no index". It lives until the
//! caller removes it with [`SessionManager::remove`]; nothing is evicted
//! behind the caller's back.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use docchat_core::{
    AnswerEngine, ConversationMemory, ConversationTurn, Document, Error, Index, Result,
    RetrievedChunk,
};

use crate::ingest::{IngestPipeline, IngestReport};
use crate::progress::{IngestProgressReporter, NoProgress};

#[derive(Default)]
struct SessionState {
    index: Option<Arc<Index>>,
    memory: ConversationMemory,
}

#[derive(Default)]
pub struct Session {
    state: Mutex<SessionState>,
}

/// Response of one successful question.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub history: Vec<ConversationTurn>,
    pub sources: Vec<RetrievedChunk>,
}

/// Owns every session plus the shared pipeline and answer engine.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    pipeline: IngestPipeline,
    engine: Arc<AnswerEngine>,
    progress: Arc<dyn IngestProgressReporter>,
}

impl SessionManager {
    pub fn new(pipeline: IngestPipeline, engine: Arc<AnswerEngine>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            pipeline,
            engine,
            progress: Arc::new(NoProgress),
        }
    }

    /// Report ingestion progress to `progress` instead of discarding it.
    pub fn with_progress(mut self, progress: Arc<dyn IngestProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Register a new, empty session and return its id.
    pub fn create_session(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.get_or_create(&id);
        id
    }

    fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(session_id).cloned()
    }

    fn get_or_create(&self, session_id: &str) -> Arc<Session> {
        if let Some(session) = self.get(session_id) {
            return session;
        }
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Session::default()))
            .clone()
    }

    /// Replace the session's corpus with `documents`.
    ///
    /// Creates the session if needed. On success the new index is live and
    /// the conversation history is empty. On failure the session, if it
    /// existed, keeps its previous index and history untouched.
    pub async fn ingest(&self, session_id: &str, documents: Vec<Document>) -> Result<IngestReport> {
        if documents.is_empty() {
            return Err(Error::configuration("no documents to ingest"));
        }

        let (index, report) = self
            .pipeline
            .run(documents, self.engine.embedder().as_ref(), self.progress.as_ref())
            .await?;

        let session = self.get_or_create(session_id);
        let mut state = session.state.lock().await;
        state.index = Some(Arc::new(index));
        state.memory = ConversationMemory::new();

        tracing::info!(session = %session_id, index_id = %report.index_id, "session corpus replaced");
        Ok(report)
    }

    /// Answer `question` against the session's current corpus.
    ///
    /// # Errors
    ///
    /// `NoCorpus` if the session is unknown or has never ingested anything;
    /// otherwise whatever [`AnswerEngine::ask`] reports. History is only
    /// extended on success.
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<AskResponse> {
        if question.trim().is_empty() {
            return Err(Error::configuration("question must not be empty"));
        }

        let session = self.get(session_id).ok_or_else(|| Error::NoCorpus {
            session_id: session_id.to_string(),
        })?;

        let mut state = session.state.lock().await;
        let index = state.index.clone().ok_or_else(|| Error::NoCorpus {
            session_id: session_id.to_string(),
        })?;

        let answer = self.engine.ask(question, &index, &mut state.memory).await?;

        Ok(AskResponse {
            answer: answer.text,
            history: answer.history,
            sources: answer.sources,
        })
    }

    /// Full conversation history of a session, oldest first.
    pub async fn history(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let session = self.get(session_id).ok_or_else(|| Error::NoCorpus {
            session_id: session_id.to_string(),
        })?;
        let state = session.state.lock().await;
        Ok(state.memory.snapshot().to_vec())
    }

    /// Id of the session's current index, if it has one.
    pub async fn index_id(&self, session_id: &str) -> Option<String> {
        let session = self.get(session_id)?;
        let state = session.state.lock().await;
        state.index.as_ref().map(|i| i.id().to_string())
    }

    /// Forget a session, releasing its index and history.
    ///
    /// An exchange already in flight keeps its own handle and completes;
    /// later calls see an unknown session.
    pub fn remove(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.remove(session_id) {
            Some(_) => {
                tracing::info!(session = %session_id, "session removed");
                Ok(())
            }
            None => Err(Error::NoCorpus {
                session_id: session_id.to_string(),
            }),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
