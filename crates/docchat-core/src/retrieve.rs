//! Top-k retrieval against an [`Index`].
//!
//! The question is embedded with the same capability the index was built
//! with. Embedding spaces of different models are not comparable, so an
//! embedder whose model id differs from the index stamp is rejected before
//! any embedding call is made.

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::models::RetrievedChunk;

/// Number of chunks retrieved when the caller does not say otherwise.
pub const DEFAULT_TOP_K: usize = 4;

/// Return up to `k` chunks of `index` most similar to `question`.
///
/// Results are ordered by score (descending), ties broken by index
/// position (document order, then chunk ordinal). Identical inputs always
/// give identical output.
///
/// # Errors
///
/// - `Configuration` if `k` is 0.
/// - `EmbeddingModelMismatch` if `embedder` is not the index's model.
/// - `Embedding` if embedding the question fails or yields a vector of
///   the wrong dimension.
pub async fn retrieve(
    index: &Index,
    embedder: &dyn Embedder,
    question: &str,
    k: usize,
) -> Result<Vec<RetrievedChunk>> {
    if k == 0 {
        return Err(Error::configuration("top_k must be >= 1"));
    }

    if embedder.model_id() != index.model_id() {
        return Err(Error::EmbeddingModelMismatch {
            index_model: index.model_id().to_string(),
            query_model: embedder.model_id().to_string(),
        });
    }

    if index.is_empty() || question.trim().is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = embedder
        .embed(&[question.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::embedding("empty embedding response"))?;

    if query_vec.len() != index.dims() {
        return Err(Error::embedding(format!(
            "query vector has {} dimensions, index has {}",
            query_vec.len(),
            index.dims()
        )));
    }
    if query_vec.iter().any(|v| !v.is_finite()) {
        return Err(Error::embedding("query vector contains non-finite values"));
    }

    let hits = index.search(&query_vec, k);
    tracing::debug!(index_id = %index.id(), k, hits = hits.len(), "retrieved chunks");
    Ok(hits)
}
