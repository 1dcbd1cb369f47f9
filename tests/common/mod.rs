#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docchat::extract::PdfExtractor;
use docchat::ingest::IngestPipeline;
use docchat::session::SessionManager;
use docchat_core::{
    AnswerConfig, AnswerEngine, BuildOptions, ChunkConfig, Embedder, Error, GenerationRequest,
    Generator, PagePolicy, Result,
};

/// Minimal uncompressed PDF with one Helvetica text line per page.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    pdf_with_padding(pages, 0)
}

/// Like [`pdf_with_pages`], plus an unreferenced stream object of
/// `padding` bytes to reach a given file size.
pub fn pdf_with_padding(pages: &[&str], padding: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut offsets = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            pages.len()
        )
        .as_bytes(),
    );
    offsets.push(out.len());
    out.extend_from_slice(b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n");

    for (i, text) in pages.iter().enumerate() {
        let page_id = 4 + 2 * i;
        let content_id = page_id + 1;
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text);
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_id, content_id
            )
            .as_bytes(),
        );
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_id,
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    if padding > 0 {
        offsets.push(out.len());
        out.extend_from_slice(
            format!("{} 0 obj << /Length {} >> stream\n", 4 + 2 * pages.len(), padding).as_bytes(),
        );
        out.resize(out.len() + padding, b'A');
        out.extend_from_slice(b"\nendstream endobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

pub const VOCAB: [&str; 5] = ["tuition", "library", "exam", "parking", "lunch"];

/// Bag-of-keywords embedder; the last component keeps vectors non-zero.
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "test/keywords"
    }
    fn dims(&self) -> usize {
        VOCAB.len() + 1
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = VOCAB.iter().map(|w| lower.matches(w).count() as f32).collect();
                v.push(0.01);
                v
            })
            .collect())
    }
}

/// Records every request and answers "A<n>"; can be switched to fail.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub requests: Mutex<Vec<GenerationRequest>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_id(&self) -> &str {
        "test/scripted"
    }
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::generation("upstream returned 503"));
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(format!("A{}", requests.len()))
    }
}

pub fn manager(generator: Arc<ScriptedGenerator>) -> SessionManager {
    let pipeline = IngestPipeline::new(
        Arc::new(PdfExtractor::new(PagePolicy::FailFast)),
        ChunkConfig::default(),
        BuildOptions::default(),
    );
    let engine = AnswerEngine::new(
        Arc::new(KeywordEmbedder::new()),
        generator,
        AnswerConfig::default(),
    );
    SessionManager::new(pipeline, Arc::new(engine))
}
