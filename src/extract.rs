//! PDF text extraction.
//!
//! [`PdfExtractor`] implements [`TextExtractor`] on top of `pdf-extract`,
//! reading pages in order and concatenating their text with no separator.
//!
//! Under [`PagePolicy::SkipPage`] a document `pdf-extract` cannot process is
//! retried page by page through `lopdf`, dropping the pages that fail.
//! Panics inside either PDF library are caught and reported as
//! `DocumentRead` for the document at hand.

use std::panic::{catch_unwind, AssertUnwindSafe};

use docchat_core::{Document, Error, ExtractedText, PagePolicy, TextExtractor};

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor {
    policy: PagePolicy,
}

impl PdfExtractor {
    pub fn new(policy: PagePolicy) -> Self {
        Self { policy }
    }
}

impl TextExtractor for PdfExtractor {
    fn extract(&self, document: &Document) -> docchat_core::Result<ExtractedText> {
        let extracted = match extract_pages(&document.bytes) {
            Ok(pages) => ExtractedText {
                document_id: document.id.clone(),
                pages: pages.len(),
                text: pages.concat(),
                skipped_pages: Vec::new(),
            },
            Err(reason) => match self.policy {
                PagePolicy::FailFast => return Err(Error::document_read(&document.id, reason)),
                PagePolicy::SkipPage => {
                    tracing::warn!(
                        document = %document.id,
                        error = %reason,
                        "whole-document extraction failed, retrying page by page"
                    );
                    extract_page_by_page(document)?
                }
            },
        };

        if extracted.text.trim().is_empty() {
            return Err(Error::document_read(
                &document.id,
                "no extractable text (scanned or image-only PDF?)",
            ));
        }

        tracing::debug!(
            document = %document.id,
            pages = extracted.pages,
            skipped = extracted.skipped_pages.len(),
            chars = extracted.text.chars().count(),
            "extracted text"
        );
        Ok(extracted)
    }
}

fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, String> {
    match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(bytes))) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(format!("PDF extraction failed: {}", e)),
        Err(_) => Err("PDF extraction panicked".to_string()),
    }
}

/// Per-page fallback through `lopdf`. Pages that fail are skipped and
/// listed; a document with no readable page is an error.
fn extract_page_by_page(document: &Document) -> docchat_core::Result<ExtractedText> {
    let loaded = catch_unwind(AssertUnwindSafe(|| lopdf::Document::load_mem(&document.bytes)));
    let pdf = match loaded {
        Ok(Ok(pdf)) => pdf,
        Ok(Err(e)) => {
            return Err(Error::document_read(
                &document.id,
                format!("not a readable PDF: {}", e),
            ))
        }
        Err(_) => return Err(Error::document_read(&document.id, "PDF parser panicked")),
    };

    let page_numbers: Vec<u32> = pdf.get_pages().keys().copied().collect();
    collect_pages(&document.id, &page_numbers, |page_number| {
        match catch_unwind(AssertUnwindSafe(|| pdf.extract_text(&[page_number]))) {
            Ok(Ok(page_text)) => Ok(page_text),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("parser panicked".to_string()),
        }
    })
}

/// Read `page_numbers` in order, keeping the pages `read_page` returns and
/// listing the ones it fails on.
fn collect_pages(
    document_id: &str,
    page_numbers: &[u32],
    mut read_page: impl FnMut(u32) -> Result<String, String>,
) -> docchat_core::Result<ExtractedText> {
    let mut text = String::new();
    let mut pages = 0;
    let mut skipped_pages = Vec::new();

    for &page_number in page_numbers {
        match read_page(page_number) {
            Ok(page_text) => {
                text.push_str(&page_text);
                pages += 1;
            }
            Err(e) => {
                tracing::warn!(document = %document_id, page = page_number, error = %e, "skipping page");
                skipped_pages.push(page_number);
            }
        }
    }

    if pages == 0 {
        return Err(Error::document_read(document_id, "no page could be extracted"));
    }

    Ok(ExtractedText {
        document_id: document_id.to_string(),
        text,
        pages,
        skipped_pages,
    })
}
