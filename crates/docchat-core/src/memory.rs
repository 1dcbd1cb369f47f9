//! Append-only conversation history.
//!
//! Turns are never removed or reordered within a session. Bounding the
//! prompt is a separate, configurable [`MemoryPolicy`] applied when context
//! is assembled; the stored history itself always stays complete.

use serde::{Deserialize, Serialize};

use crate::models::ConversationTurn;

/// Which part of the history is sent to the generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryPolicy {
    /// Send every turn.
    #[default]
    Unbounded,
    /// Send only the most recent `max_turns` turns.
    Window { max_turns: usize },
}

/// Ordered question/answer history of one session.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<ConversationTurn>,
}

impl ConversationMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn at the end of the history.
    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Immutable view of the full history, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The slice of history `policy` allows into a prompt.
    #[must_use]
    pub fn context(&self, policy: MemoryPolicy) -> &[ConversationTurn] {
        match policy {
            MemoryPolicy::Unbounded => &self.turns,
            MemoryPolicy::Window { max_turns } => {
                let skip = self.turns.len().saturating_sub(max_turns);
                &self.turns[skip..]
            }
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
