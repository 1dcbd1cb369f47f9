//! Question answering over an index with conversational memory.
//!
//! [`AnswerEngine::ask`] runs one exchange:
//!
//! 1. optionally condenses a follow-up into a standalone question,
//! 2. retrieves the top-k chunks for it,
//! 3. builds a [`GenerationRequest`] from the retrieved text, the history
//!    allowed by the [`MemoryPolicy`] and the new question,
//! 4. calls the [`Generator`],
//! 5. appends the user turn and the assistant turn to memory.
//!
//! Memory is only written in step 5. A failure at any earlier step, or a
//! dropped future, leaves the history exactly as it was.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::Index;
use crate::memory::{ConversationMemory, MemoryPolicy};
use crate::models::{ConversationTurn, RetrievedChunk};
use crate::retrieve::{retrieve, DEFAULT_TOP_K};

/// Default instruction given to the generator.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions about \
the user's uploaded documents. Use the context passages below to answer. If the context does \
not contain the answer, say that you don't know instead of making one up.";

/// Instruction used to rewrite a follow-up into a standalone question.
pub const CONDENSE_PROMPT: &str = "Given the conversation so far and a follow-up question, \
rephrase the follow-up question to be a standalone question. Reply with the standalone \
question only.";

/// A chat message as sent to a generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Everything a generator needs to produce one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    /// Retrieved passages, best first.
    pub context: Vec<String>,
    /// Prior turns, oldest first, verbatim.
    pub history: Vec<ConversationTurn>,
    pub question: String,
}

impl GenerationRequest {
    /// Render as a chat transcript: one system message carrying the
    /// instruction and context, the history turns, then the question.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut system = self.system.clone();
        if !self.context.is_empty() {
            system.push_str("\n\nContext:\n");
            system.push_str(&self.context.join("\n\n---\n\n"));
        }

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::new("system", system));
        for turn in &self.history {
            messages.push(ChatMessage::new(turn.role.as_str(), turn.content.clone()));
        }
        messages.push(ChatMessage::new("user", self.question.clone()));
        messages
    }
}

/// A text generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Identifier of the chat model, e.g. `"openai/gpt-4o-mini"`.
    fn model_id(&self) -> &str;

    /// Produce the assistant reply for `request`.
    ///
    /// Failures are reported as `Error::Generation`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Tunables for [`AnswerEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerConfig {
    pub top_k: usize,
    pub system_prompt: String,
    pub memory_policy: MemoryPolicy,
    /// Rewrite follow-ups into standalone questions before retrieval.
    pub condense_question: bool,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            memory_policy: MemoryPolicy::Unbounded,
            condense_question: false,
        }
    }
}

/// Result of one successful exchange.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<RetrievedChunk>,
    /// The full history after this exchange.
    pub history: Vec<ConversationTurn>,
}

/// Couples retrieval, memory and generation.
pub struct AnswerEngine {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    config: AnswerConfig,
}

impl AnswerEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        config: AnswerConfig,
    ) -> Self {
        Self {
            embedder,
            generator,
            config,
        }
    }

    /// The embedder questions are embedded with. Indexes queried through
    /// this engine must be built with an embedder of the same model.
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn config(&self) -> &AnswerConfig {
        &self.config
    }

    /// Answer `question` against `index`, recording the exchange in `memory`.
    ///
    /// An index with no chunks still produces an answer; the generator just
    /// gets no context passages.
    ///
    /// # Errors
    ///
    /// Retrieval errors (`Configuration`, `EmbeddingModelMismatch`,
    /// `Embedding`) and `Generation` errors. `memory` is unchanged on error.
    pub async fn ask(
        &self,
        question: &str,
        index: &Index,
        memory: &mut ConversationMemory,
    ) -> Result<Answer> {
        let history = memory.context(self.config.memory_policy).to_vec();

        let search_query = if self.config.condense_question && !history.is_empty() {
            self.condense(question, &history).await?
        } else {
            question.to_string()
        };

        let sources = retrieve(index, self.embedder.as_ref(), &search_query, self.config.top_k).await?;

        let request = GenerationRequest {
            system: self.config.system_prompt.clone(),
            context: sources.iter().map(|s| s.chunk.text.clone()).collect(),
            history,
            question: question.to_string(),
        };

        let text = self.generator.generate(&request).await?;

        tracing::debug!(
            sources = sources.len(),
            history = request.history.len(),
            model = self.generator.model_id(),
            "generated answer"
        );

        memory.append(ConversationTurn::user(question));
        memory.append(ConversationTurn::assistant(text.clone()));

        Ok(Answer {
            text,
            sources,
            history: memory.snapshot().to_vec(),
        })
    }

    async fn condense(&self, question: &str, history: &[ConversationTurn]) -> Result<String> {
        let request = GenerationRequest {
            system: CONDENSE_PROMPT.to_string(),
            context: Vec::new(),
            history: history.to_vec(),
            question: question.to_string(),
        };
        let rewritten = self.generator.generate(&request).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(rewritten.to_string())
        }
    }
}
