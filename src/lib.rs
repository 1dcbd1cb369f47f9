//! # docchat
//!
//! Chat with your PDF documents. docchat extracts the text of uploaded
//! PDFs, splits it into overlapping chunks, embeds them into an in-memory
//! index, and answers questions with a chat model grounded on the most
//! relevant passages, remembering the conversation so follow-ups work.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//! │ PDF bytes │──▶│ extract+chunk │──▶│ Index (Arc)  │
//! └───────────┘   └──────────────┘   └──────┬───────┘
//!                                           │ retrieve
//!                 ┌──────────────┐   ┌──────▼───────┐
//!   question ────▶│ AnswerEngine │◀──│   Session    │
//!                 └──────┬───────┘   │ index+memory │
//!                        ▼           └──────────────┘
//!                   Generator
//! ```
//!
//! The runtime-agnostic pipeline lives in [`docchat_core`]; this crate adds
//! configuration, PDF extraction, network providers, sessions, the CLI and
//! the HTTP server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF text extraction |
//! | [`embedding`] | OpenAI / Ollama / local embedders |
//! | [`generation`] | OpenAI / Ollama chat models |
//! | [`ingest`] | Documents → index pipeline |
//! | [`session`] | Per-session index and memory |
//! | [`server`] | HTTP API |
//! | [`chat`] | CLI chat, ask and chunk commands |

pub mod chat;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod progress;
pub mod server;
pub mod session;

use std::sync::Arc;

use docchat_core::AnswerEngine;

use crate::config::Config;
use crate::extract::PdfExtractor;
use crate::ingest::IngestPipeline;
use crate::session::SessionManager;

/// Ingestion pipeline configured from `config` (no providers needed).
pub fn build_pipeline(config: &Config) -> IngestPipeline {
    IngestPipeline::new(
        Arc::new(PdfExtractor::new(config.extraction.page_policy)),
        config.chunking.clone(),
        config.build_options(),
    )
}

/// Session manager with the embedder and generator selected by `config`.
pub fn build_session_manager(config: &Config) -> anyhow::Result<SessionManager> {
    let embedder = embedding::create_embedder(&config.embedding)?;
    let generator = generation::create_generator(&config.generation)?;
    let engine = AnswerEngine::new(embedder, generator, config.answer_config());
    Ok(SessionManager::new(build_pipeline(config), Arc::new(engine)))
}
