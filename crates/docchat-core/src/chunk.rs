//! Separator-aware sliding-window text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters,
//! preferring to end each chunk on a `separator` boundary and carrying the
//! last `chunk_overlap` characters of every finished chunk into the next one.
//!
//! Chunks are verbatim substrings of the input (the separator stays attached
//! to the text it terminates), so the input can always be rebuilt from the
//! chunks and their character offsets.
//!
//! # Algorithm
//!
//! 1. Validate the config: `chunk_size > 0` and `chunk_overlap < chunk_size`.
//! 2. Text of at most `chunk_size` characters becomes exactly one chunk.
//! 3. Collect separator boundaries (the character offset just past each match).
//! 4. A window starting at `s` ends at the furthest boundary `b` with
//!    `s + carried < b <= s + chunk_size`, where `carried` is the overlap
//!    inherited from the previous window. Without such a boundary the window
//!    is hard-cut at `s + chunk_size`.
//! 5. The next window starts `chunk_overlap` characters before the end of
//!    the previous one.
//!
//! Every window ends strictly after the previous one, so the loop always
//! terminates. Lengths are measured in Unicode scalar values.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::chunk::{chunk_text, ChunkConfig};
//!
//! let chunks = chunk_text("doc-1", "Hello world.\nSecond line.", &ChunkConfig::default()).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].ordinal, 0);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_SEPARATOR: &str = "\n";

/// Chunking parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks. Must be below `chunk_size`.
    pub chunk_overlap: usize,
    /// Preferred split point. An empty separator means fixed-size windows.
    pub separator: String,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl ChunkConfig {
    /// Reject configurations the chunker cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::configuration("chunk_size must be > 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split `text` into overlapping chunks attributed to `document_id`.
///
/// # Guarantees
///
/// - The config is validated before any work is done.
/// - Text no longer than `chunk_size` yields exactly one chunk equal to the
///   input, even when the text is empty.
/// - Ordinals are contiguous: `0, 1, …, N-1`.
/// - Every chunk has at most `chunk_size` characters.
/// - Output is a pure function of the inputs, ids included.
pub fn chunk_text(document_id: &str, text: &str, config: &ChunkConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;

    if total <= config.chunk_size {
        return Ok(vec![make_chunk(document_id, 0, text, 0, total)]);
    }

    let boundaries = separator_boundaries(text, &config.separator, &offsets);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut carried = 0usize;

    loop {
        let limit = (start + config.chunk_size).min(total);
        let end = if limit == total {
            total
        } else {
            last_boundary_in(&boundaries, start + carried, limit).unwrap_or(limit)
        };

        let piece = &text[offsets[start]..offsets[end]];
        chunks.push(make_chunk(document_id, chunks.len(), piece, start, end));

        if end == total {
            break;
        }

        let next_start = end.saturating_sub(config.chunk_overlap);
        carried = end - next_start;
        start = next_start;
    }

    Ok(chunks)
}

/// Character offsets just past every separator occurrence, ascending.
fn separator_boundaries(text: &str, separator: &str, offsets: &[usize]) -> Vec<usize> {
    if separator.is_empty() {
        return Vec::new();
    }
    text.match_indices(separator)
        .filter_map(|(pos, m)| offsets.binary_search(&(pos + m.len())).ok())
        .collect()
}

/// The largest boundary `b` with `floor < b <= limit`.
fn last_boundary_in(boundaries: &[usize], floor: usize, limit: usize) -> Option<usize> {
    let idx = boundaries.partition_point(|&b| b <= limit);
    if idx == 0 {
        return None;
    }
    let b = boundaries[idx - 1];
    (b > floor).then_some(b)
}

fn make_chunk(document_id: &str, ordinal: usize, text: &str, start: usize, end: usize) -> Chunk {
    let hash = format!("{:x}", Sha256::digest(text.as_bytes()));

    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(ordinal.to_le_bytes());
    hasher.update(hash.as_bytes());
    let digest = hasher.finalize();
    let mut id_bytes = [0u8; 16];
    id_bytes.copy_from_slice(&digest[..16]);

    Chunk {
        id: Uuid::from_bytes(id_bytes).to_string(),
        document_id: document_id.to_string(),
        ordinal,
        text: text.to_string(),
        start,
        end,
        hash,
    }
}
