//! Configuration parsing and validation.
//!
//! docchat reads a single TOML file (default `./config/docchat.toml`).
//! Every section and every field has a default, so an empty file is a valid
//! configuration that chats through OpenAI with `text-embedding-3-small`.
//!
//! ```toml
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [retrieval]
//! top_k = 4
//! metric = "cosine"
//!
//! [embedding]
//! provider = "openai"          # openai | ollama | local
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [generation]
//! provider = "openai"          # openai | ollama
//! model = "gpt-4o-mini"
//!
//! [extraction]
//! page_policy = "fail_fast"    # fail_fast | skip_page
//!
//! [memory]
//! max_turns = 0                # 0 = send the whole history
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```
//!
//! Secrets never live in this file; `OPENAI_API_KEY` is read from the
//! environment (a `.env` file is loaded at startup).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use docchat_core::{
    AnswerConfig, BuildOptions, ChunkConfig, MemoryPolicy, Metric, PagePolicy,
    DEFAULT_SYSTEM_PROMPT, DEFAULT_TOP_K,
};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub extraction: ExtractionConfig,
    pub memory: MemoryConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub metric: Metric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            metric: Metric::default(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible endpoint or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    /// Model name, falling back to the provider's default.
    pub fn model_name(&self) -> Option<String> {
        self.model.clone().or_else(|| match self.provider.as_str() {
            "openai" => Some("text-embedding-3-small".to_string()),
            "local" => Some("all-minilm-l6-v2".to_string()),
            _ => None,
        })
    }

    /// Dimensionality, falling back to the known size of the default model.
    pub fn dimensions(&self) -> Option<usize> {
        self.dims.or_else(|| match self.model_name().as_deref() {
            Some("text-embedding-3-small") | Some("text-embedding-ada-002") => Some(1536),
            Some("text-embedding-3-large") => Some(3072),
            _ => None,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound on one generation call, retries and backoff included.
    #[serde(default = "default_generation_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            url: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: default_generation_timeout_secs(),
            max_retries: default_max_retries(),
            deadline_secs: default_generation_deadline_secs(),
            system_prompt: None,
        }
    }
}

fn default_generation_provider() -> String {
    "openai".to_string()
}
fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    120
}
fn default_generation_deadline_secs() -> u64 {
    180
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub page_policy: PagePolicy,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MemoryConfig {
    /// Most recent turns sent to the generator; `0` sends all of them.
    /// The stored history is never truncated.
    #[serde(default)]
    pub max_turns: usize,
    /// Rewrite follow-up questions into standalone ones before retrieval.
    #[serde(default)]
    pub condense_question: bool,
}

impl MemoryConfig {
    pub fn policy(&self) -> MemoryPolicy {
        if self.max_turns == 0 {
            MemoryPolicy::Unbounded
        } else {
            MemoryPolicy::Window {
                max_turns: self.max_turns,
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest accepted request body. Uploads are base64, so this is about
    /// 4/3 of the largest PDF batch.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}
fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}

impl Config {
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            metric: self.retrieval.metric,
            batch_size: self.embedding.batch_size,
        }
    }

    pub fn answer_config(&self) -> AnswerConfig {
        AnswerConfig {
            top_k: self.retrieval.top_k,
            system_prompt: self
                .generation
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            memory_policy: self.memory.policy(),
            condense_question: self.memory.condense_question,
        }
    }
}

/// Read and validate the config file at `path`.
///
/// A missing file yields the defaults; a present but invalid one is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

/// Parse TOML content without validating it.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

/// Check the settings that cannot be expressed by types alone.
pub fn validate(config: &Config) -> Result<()> {
    // Chunking
    config
        .chunking
        .validate()
        .map_err(|e| anyhow::anyhow!("chunking: {}", e))?;

    // Retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    // Embedding
    let embedding = &config.embedding;
    match embedding.provider.as_str() {
        "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be openai, ollama, or local.",
            other
        ),
    }
    if embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if embedding.model_name().is_none() {
        bail!(
            "embedding.model must be specified when provider is '{}'",
            embedding.provider
        );
    }
    if embedding.provider != "local" && matches!(embedding.dimensions(), None | Some(0)) {
        bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            embedding.provider
        );
    }

    if config.server.max_upload_bytes == 0 {
        bail!("server.max_upload_bytes must be > 0");
    }

    // Generation
    match config.generation.provider.as_str() {
        "openai" | "ollama" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be openai or ollama.",
            other
        ),
    }
    if config.generation.deadline_secs == 0 {
        bail!("generation.deadline_secs must be > 0");
    }
    if config.generation.model.trim().is_empty() {
        bail!("generation.model must not be empty");
    }
    if let Some(t) = config.generation.temperature {
        if !(0.0..=2.0).contains(&t) {
            bail!("generation.temperature must be in [0.0, 2.0]");
        }
    }

    Ok(())
}
