
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DocbaseError, Result};

/// A bounded span of a document's text, the unit of indexing and retrieval.
/// Immutable once created; `chunk_index` is unique within its document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub chunk_index: usize,
    /// Offset of the first character within the document text, in chars.
    pub char_offset: usize,
    /// Length of the chunk in chars.
    pub char_len: usize,
}

/// Configuration for fixed-size overlapping chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in characters; must be smaller than
    /// the chunk size.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Splits extracted document text into an ordered sequence of overlapping
/// chunks. Each chunk's starting offset advances by `chunk_size - overlap`
/// from the previous chunk; the final chunk may be shorter than the target.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Rejects configurations where the overlap is not strictly smaller than
    /// the chunk size; no partial chunking is ever attempted with them.
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(DocbaseError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(DocbaseError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Splits `text` into chunks. Empty text yields zero chunks; callers
    /// treat a zero-chunk document as a validation failure, not a success.
    /// Operates on char indices so multi-byte text never splits mid-scalar.
    #[inline]
    pub fn chunk_text(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.config.chunk_size - self.config.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let end = (start + self.config.chunk_size).min(chars.len());
            chunks.push(Chunk {
                text: chars[start..end].iter().collect(),
                chunk_index: chunks.len(),
                char_offset: start,
                char_len: end - start,
            });

            if end == chars.len() {
                break;
            }
            start += step;
        }

        debug!(
            "Split {} chars into {} chunks (size {}, overlap {})",
            chars.len(),
            chunks.len(),
            self.config.chunk_size,
            self.config.chunk_overlap
        );

        chunks
    }
}
