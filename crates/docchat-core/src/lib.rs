//! # docchat core
//!
//! Runtime-agnostic logic for docchat: data models, chunking, the embedding
//! index, retrieval, conversation memory and the answer engine.
//!
//! This crate contains no tokio, HTTP client, PDF library or filesystem I/O.
//! Embedding and generation are consumed through the [`Embedder`] and
//! [`Generator`] traits; text extraction through [`TextExtractor`].
//!
//! ## Pipeline
//!
//! ```text
//! Document ─▶ TextExtractor ─▶ chunk_text ─▶ Index::build
//!                                                 │
//! question ─▶ retrieve ◀──────────────────────────┘
//!                │
//!                ▼
//!          AnswerEngine ─▶ Generator ─▶ ConversationMemory
//! ```

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod memory;
pub mod models;
pub mod retrieve;

pub use answer::{
    Answer, AnswerConfig, AnswerEngine, ChatMessage, GenerationRequest, Generator,
    CONDENSE_PROMPT, DEFAULT_SYSTEM_PROMPT,
};
pub use chunk::{chunk_text, ChunkConfig};
pub use embedding::{Embedder, Metric};
pub use error::{Error, Result};
pub use extract::{ExtractedText, PagePolicy, TextExtractor};
pub use index::{BuildOptions, Index, IndexEntry};
pub use memory::{ConversationMemory, MemoryPolicy};
pub use models::{Chunk, ConversationTurn, Document, RetrievedChunk, Role};
pub use retrieve::{retrieve, DEFAULT_TOP_K};
