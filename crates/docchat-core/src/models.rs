//! Core data models flowing through ingestion and query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded document: opaque bytes plus a caller-chosen identifier.
///
/// Documents are ephemeral; the pipeline never persists them.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            bytes: bytes.into(),
        }
    }
}

/// A bounded, contiguous segment of a document's text.
///
/// `start` and `end` are character (not byte) offsets into the extracted
/// document text, so `text` equals `doc_text.chars().skip(start).take(end - start)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic UUID derived from document id, ordinal and text.
    pub id: String,
    pub document_id: String,
    /// Position of this chunk within its document, starting at 0.
    pub ordinal: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
    /// SHA-256 of `text`.
    pub hash: String,
}

impl Chunk {
    /// Length of the chunk in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in the session's conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A chunk returned by retrieval, with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Higher is more similar. Cosine similarity in `[-1, 1]`, or negated
    /// Euclidean distance for the `l2` metric.
    pub score: f32,
}
