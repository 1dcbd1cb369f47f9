//! Immutable embedding index with exact nearest-neighbour search.
//!
//! [`Index::build`] embeds every chunk through an [`Embedder`] and stores
//! each vector next to its chunk, so the index can never hold a vector
//! without a backing chunk. The result is stamped with the embedder's
//! model id, the vector dimensionality and the similarity [`Metric`].
//!
//! Building never touches an existing index. Callers publish a freshly
//! built index by swapping an `Arc<Index>`; nothing mutates one in place.
//!
//! Search is brute force over all entries, which keeps ranking exact and
//! deterministic for the corpus sizes a single chat session uploads.

use uuid::Uuid;

use crate::embedding::{Embedder, Metric};
use crate::error::{Error, Result};
use crate::models::{Chunk, RetrievedChunk};

/// Parameters for [`Index::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub metric: Metric,
    /// Texts sent to the embedder per call.
    pub batch_size: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            metric: Metric::Cosine,
            batch_size: 64,
        }
    }
}

/// A chunk together with its embedding.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A searchable, immutable set of embedded chunks.
#[derive(Debug)]
pub struct Index {
    id: Uuid,
    model_id: String,
    dims: usize,
    metric: Metric,
    entries: Vec<IndexEntry>,
}

impl Index {
    /// Embed `chunks` and assemble an index over them.
    ///
    /// Entry order is chunk input order, which is also the tie-break order
    /// for equal scores.
    ///
    /// # Errors
    ///
    /// - `Configuration` if `batch_size` is 0.
    /// - `Embedding` if the embedder fails on any batch, returns the wrong
    ///   number of vectors, a vector of the wrong dimension, or a non-finite
    ///   component. The reason names the documents of the failing batch.
    ///   No partial index is ever returned.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        options: &BuildOptions,
    ) -> Result<Index> {
        if options.batch_size == 0 {
            return Err(Error::configuration("embedding batch_size must be > 0"));
        }

        let dims = embedder.dims();
        let mut entries = Vec::with_capacity(chunks.len());
        let mut pending = chunks.into_iter().peekable();

        while pending.peek().is_some() {
            let batch: Vec<Chunk> = pending.by_ref().take(options.batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder
                .embed(&texts)
                .await
                .map_err(|e| with_documents(e, &batch))?;

            if vectors.len() != batch.len() {
                return Err(with_documents(
                    Error::embedding(format!(
                        "expected {} vectors, provider returned {}",
                        batch.len(),
                        vectors.len()
                    )),
                    &batch,
                ));
            }

            if let Some(err) = vectors.iter().find_map(|v| check_vector(v, dims).err()) {
                return Err(with_documents(err, &batch));
            }
            entries.extend(
                batch
                    .into_iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| IndexEntry { chunk, vector }),
            );

            tracing::debug!(embedded = entries.len(), "embedded batch");
        }

        let index = Index {
            id: Uuid::new_v4(),
            model_id: embedder.model_id().to_string(),
            dims,
            metric: options.metric,
            entries,
        };

        tracing::info!(
            index_id = %index.id,
            model = %index.model_id,
            chunks = index.len(),
            metric = index.metric.as_str(),
            "built index"
        );

        Ok(index)
    }

    /// Rank all entries against `query` and return the best `k`.
    ///
    /// Sorted by score descending; equal scores keep index order, so results
    /// are deterministic. The caller is responsible for checking that
    /// `query` came from the same model (see [`crate::retrieve`]).
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<RetrievedChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (pos, self.metric.score(query, &e.vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(pos, score)| RetrievedChunk {
                chunk: self.entries[pos].chunk.clone(),
                score,
            })
            .collect()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append the distinct document ids of `batch` to an embedding failure.
fn with_documents(err: Error, batch: &[Chunk]) -> Error {
    match err {
        Error::Embedding { reason } => {
            let mut ids: Vec<&str> = Vec::new();
            for chunk in batch {
                if !ids.contains(&chunk.document_id.as_str()) {
                    ids.push(&chunk.document_id);
                }
            }
            Error::embedding(format!("{} (documents: {})", reason, ids.join(", ")))
        }
        other => other,
    }
}

fn check_vector(vector: &[f32], dims: usize) -> Result<()> {
    if vector.len() != dims {
        return Err(Error::embedding(format!(
            "expected {}-dimensional vector, got {}",
            dims,
            vector.len()
        )));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::embedding("vector contains non-finite values"));
    }
    Ok(())
}
