//! Text extraction contract.
//!
//! Extraction turns one [`Document`] into one text string. Pages are read in
//! order and concatenated exactly as the source format yields them; no
//! separator is inserted between pages.
//!
//! What happens when some pages fail is governed by an explicit
//! [`PagePolicy`] rather than left to the implementation.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Document;

/// Behaviour when individual pages cannot be extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagePolicy {
    /// Any page failure aborts the whole document with `DocumentRead`.
    #[default]
    FailFast,
    /// Failing pages are skipped and reported in [`ExtractedText::skipped_pages`].
    /// A document whose pages all fail still errors.
    SkipPage,
}

/// Text extracted from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub document_id: String,
    pub text: String,
    /// Number of pages that contributed text.
    pub pages: usize,
    /// 1-based numbers of pages dropped under [`PagePolicy::SkipPage`].
    pub skipped_pages: Vec<u32>,
}

/// Turns document bytes into text.
///
/// Implementations report unreadable documents, and documents with no
/// extractable text, as `Error::DocumentRead` carrying the document id.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, document: &Document) -> Result<ExtractedText>;
}
