//! Ingestion pipeline: documents → text → chunks → index.
//!
//! ```text
//! Vec<Document> ─▶ PdfExtractor (spawn_blocking) ─▶ chunk_text ─▶ Index::build
//! ```
//!
//! The pipeline is all-or-nothing: the first document that cannot be read,
//! or any embedding failure, aborts the batch and no index is produced.
//! Callers only publish the returned [`Index`] on success, so a failed
//! ingestion never disturbs an existing session.

use anyhow::{bail, Context};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use docchat_core::{
    chunk_text, BuildOptions, Chunk, ChunkConfig, Document, Embedder, Error, ExtractedText, Index,
    Result, TextExtractor,
};

use crate::progress::{IngestProgressEvent, IngestProgressReporter};

/// Pages dropped from one document under the `skip_page` policy.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedPages {
    pub document_id: String,
    pub pages: Vec<u32>,
}

/// Summary of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub index_id: String,
    pub model_id: String,
    pub documents: usize,
    pub pages: usize,
    pub chunks: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_pages: Vec<SkippedPages>,
}

/// Extraction, chunking and index-build settings for one deployment.
#[derive(Clone)]
pub struct IngestPipeline {
    extractor: Arc<dyn TextExtractor>,
    chunking: ChunkConfig,
    build: BuildOptions,
}

impl IngestPipeline {
    pub fn new(extractor: Arc<dyn TextExtractor>, chunking: ChunkConfig, build: BuildOptions) -> Self {
        Self {
            extractor,
            chunking,
            build,
        }
    }

    pub fn chunking(&self) -> &ChunkConfig {
        &self.chunking
    }

    /// Extract every document, in input order.
    ///
    /// Each extraction runs on the blocking pool. A panic inside the PDF
    /// library surfaces as `DocumentRead` for that document.
    pub async fn extract_all(
        &self,
        documents: Vec<Document>,
        progress: &dyn IngestProgressReporter,
    ) -> Result<Vec<ExtractedText>> {
        check_unique_ids(&documents)?;

        let total = documents.len() as u64;
        let mut extracted = Vec::with_capacity(documents.len());

        for (i, document) in documents.into_iter().enumerate() {
            progress.report(IngestProgressEvent::Extracting {
                document: document.id.clone(),
                n: i as u64 + 1,
                total,
            });

            let extractor = self.extractor.clone();
            let document_id = document.id.clone();
            let text = tokio::task::spawn_blocking(move || extractor.extract(&document))
                .await
                .map_err(|e| Error::document_read(&document_id, format!("extraction task failed: {}", e)))??;

            if !text.skipped_pages.is_empty() {
                tracing::warn!(
                    document = %text.document_id,
                    skipped = ?text.skipped_pages,
                    "pages skipped during extraction"
                );
            }
            extracted.push(text);
        }

        Ok(extracted)
    }

    /// Split extracted texts into chunks, document by document.
    pub fn chunk_all(&self, texts: &[ExtractedText]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for text in texts {
            chunks.extend(chunk_text(&text.document_id, &text.text, &self.chunking)?);
        }
        Ok(chunks)
    }

    /// Run the whole pipeline and return a fresh index.
    pub async fn run(
        &self,
        documents: Vec<Document>,
        embedder: &dyn Embedder,
        progress: &dyn IngestProgressReporter,
    ) -> Result<(Index, IngestReport)> {
        self.chunking.validate()?;

        let texts = self.extract_all(documents, progress).await?;
        let chunks = self.chunk_all(&texts)?;
        progress.report(IngestProgressEvent::Chunked {
            documents: texts.len() as u64,
            chunks: chunks.len() as u64,
        });

        progress.report(IngestProgressEvent::Embedding {
            chunks: chunks.len() as u64,
        });
        let index = Index::build(chunks, embedder, &self.build).await?;
        progress.report(IngestProgressEvent::Indexed {
            chunks: index.len() as u64,
        });

        let report = IngestReport {
            index_id: index.id().to_string(),
            model_id: index.model_id().to_string(),
            documents: texts.len(),
            pages: texts.iter().map(|t| t.pages).sum(),
            chunks: index.len(),
            skipped_pages: texts
                .iter()
                .filter(|t| !t.skipped_pages.is_empty())
                .map(|t| SkippedPages {
                    document_id: t.document_id.clone(),
                    pages: t.skipped_pages.clone(),
                })
                .collect(),
        };

        tracing::info!(
            index_id = %report.index_id,
            documents = report.documents,
            pages = report.pages,
            chunks = report.chunks,
            "ingestion complete"
        );

        Ok((index, report))
    }
}

fn check_unique_ids(documents: &[Document]) -> Result<()> {
    let mut seen = HashSet::new();
    for document in documents {
        if !seen.insert(document.id.as_str()) {
            return Err(Error::configuration(format!(
                "duplicate document id '{}' in one upload",
                document.id
            )));
        }
    }
    Ok(())
}

/// Load PDF documents from files and directories.
///
/// Files named explicitly are taken as-is. Directories are walked
/// recursively for `*.pdf` (case-insensitive), in sorted order. Document ids
/// are the paths as given (or as found under the directory).
pub fn load_documents(paths: &[PathBuf]) -> anyhow::Result<Vec<Document>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_pdf(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("No such file or directory: {}", path.display());
        }
    }

    if files.is_empty() {
        bail!("No PDF documents found");
    }

    files
        .into_iter()
        .map(|file| {
            let bytes =
                std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            Ok(Document::new(file.display().to_string(), bytes))
        })
        .collect()
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::sync::Mutex;

    /// Treats document bytes as UTF-8 text; fails on ids starting with "bad".
    struct Utf8Extractor;

    impl TextExtractor for Utf8Extractor {
        fn extract(&self, document: &Document) -> Result<ExtractedText> {
            if document.id.starts_with("bad") {
                return Err(Error::document_read(&document.id, "unreadable"));
            }
            Ok(ExtractedText {
                document_id: document.id.clone(),
                text: String::from_utf8_lossy(&document.bytes).into_owned(),
                pages: 1,
                skipped_pages: Vec::new(),
            })
        }
    }

    /// Reports page 2 of every document as skipped.
    struct SkippingExtractor;

    impl TextExtractor for SkippingExtractor {
        fn extract(&self, document: &Document) -> Result<ExtractedText> {
            Ok(ExtractedText {
                document_id: document.id.clone(),
                text: String::from_utf8_lossy(&document.bytes).into_owned(),
                pages: 2,
                skipped_pages: vec![2],
            })
        }
    }

    struct PanickingExtractor;

    impl TextExtractor for PanickingExtractor {
        fn extract(&self, _document: &Document) -> Result<ExtractedText> {
            panic!("corrupt xref table");
        }
    }

    struct UnitEmbedder;

    #[async_trait::async_trait]
    impl Embedder for UnitEmbedder {
        fn model_id(&self) -> &str {
            "test/unit"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<IngestProgressEvent>>);

    impl IngestProgressReporter for Recorder {
        fn report(&self, event: IngestProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn pipeline(extractor: Arc<dyn TextExtractor>) -> IngestPipeline {
        IngestPipeline::new(extractor, ChunkConfig::default(), BuildOptions::default())
    }

    #[tokio::test]
    async fn run_builds_index_and_report() {
        let docs = vec![
            Document::new("a.pdf", "x".repeat(1500)),
            Document::new("b.pdf", "short"),
        ];
        let recorder = Recorder::default();
        let (index, report) = pipeline(Arc::new(Utf8Extractor))
            .run(docs, &UnitEmbedder, &recorder)
            .await
            .unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks, index.len());
        assert_eq!(report.chunks, 3);
        assert_eq!(report.model_id, "test/unit");
        assert_eq!(report.index_id, index.id().to_string());

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events[4], IngestProgressEvent::Indexed { chunks: 3 });
    }

    #[tokio::test]
    async fn skipped_pages_reach_the_report() {
        let docs = vec![Document::new("handbook.pdf", "page one, page three")];
        let (_index, report) = pipeline(Arc::new(SkippingExtractor))
            .run(docs, &UnitEmbedder, &NoProgress)
            .await
            .unwrap();
        assert_eq!(report.pages, 2);
        assert_eq!(
            report.skipped_pages,
            vec![SkippedPages {
                document_id: "handbook.pdf".to_string(),
                pages: vec![2],
            }]
        );
    }

    #[tokio::test]
    async fn unreadable_document_aborts_batch() {
        let docs = vec![Document::new("ok.pdf", "fine"), Document::new("bad.pdf", "x")];
        let err = pipeline(Arc::new(Utf8Extractor))
            .run(docs, &UnitEmbedder, &NoProgress)
            .await
            .unwrap_err();
        assert_eq!(err, Error::document_read("bad.pdf", "unreadable"));
    }

    #[tokio::test]
    async fn extractor_panic_becomes_document_read() {
        let docs = vec![Document::new("evil.pdf", "x")];
        let err = pipeline(Arc::new(PanickingExtractor))
            .extract_all(docs, &NoProgress)
            .await
            .unwrap_err();
        match err {
            Error::DocumentRead { document_id, .. } => assert_eq!(document_id, "evil.pdf"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let docs = vec![Document::new("a.pdf", "1"), Document::new("a.pdf", "2")];
        let err = pipeline(Arc::new(Utf8Extractor))
            .run(docs, &UnitEmbedder, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn load_documents_walks_directories_for_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"b").unwrap();
        std::fs::write(dir.path().join("nested/a.PDF"), b"a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

        let docs = load_documents(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].id.ends_with("b.pdf"));
        assert!(docs[1].id.ends_with("a.PDF"));
    }

    #[test]
    fn load_documents_rejects_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_documents(&[dir.path().join("missing.pdf")]).is_err());
        assert!(load_documents(&[dir.path().to_path_buf()]).is_err());
    }
}
