//! Error taxonomy for the document-to-answer pipeline.
//!
//! Messages carry identifiers (document id, model id, session id) and
//! provider diagnostics, never question or answer text.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by ingestion and query operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A document could not be read or yielded no extractable text.
    #[error("failed to read document '{document_id}': {reason}")]
    DocumentRead {
        /// Identifier of the failing document.
        document_id: String,
        /// What went wrong.
        reason: String,
    },

    /// The embedding capability failed during index build or query.
    #[error("embedding failed: {reason}")]
    Embedding {
        /// Provider diagnostic.
        reason: String,
    },

    /// The query embedder is not the one the index was built with.
    #[error("index was built with embedding model '{index_model}', query uses '{query_model}'")]
    EmbeddingModelMismatch {
        /// Model stamped on the index.
        index_model: String,
        /// Model of the embedder used for the query.
        query_model: String,
    },

    /// The generation capability failed (timeout, quota, network, bad response).
    #[error("generation failed: {reason}")]
    Generation {
        /// Provider diagnostic.
        reason: String,
    },

    /// A question was asked before any successful ingestion.
    #[error("session '{session_id}' has no corpus; ingest documents before asking")]
    NoCorpus {
        /// The session that was queried.
        session_id: String,
    },

    /// Invalid chunking, retrieval or provider parameters.
    #[error("invalid configuration: {reason}")]
    Configuration {
        /// Which parameter is wrong and why.
        reason: String,
    },
}

impl Error {
    pub fn document_read(document_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentRead {
            document_id: document_id.into(),
            reason: reason.into(),
        }
    }

    pub fn embedding(reason: impl Into<String>) -> Self {
        Self::Embedding {
            reason: reason.into(),
        }
    }

    pub fn generation(reason: impl Into<String>) -> Self {
        Self::Generation {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Short machine-readable code, used by the HTTP error contract.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DocumentRead { .. } => "document_read",
            Self::Embedding { .. } => "embedding",
            Self::EmbeddingModelMismatch { .. } => "embedding_model_mismatch",
            Self::Generation { .. } => "generation",
            Self::NoCorpus { .. } => "no_corpus",
            Self::Configuration { .. } => "configuration",
        }
    }
}
