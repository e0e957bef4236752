// Embedding capability: maps text to fixed-dimension numeric vectors.
// Concrete providers implement `Embedder`; tests use deterministic stubs.

pub mod ollama;

pub use ollama::OllamaClient;

use crate::Result;

/// Capability interface for embedding providers. Implementations are shared
/// across request tasks and bridged onto blocking threads by the callers, so
/// they must be `Send + Sync` and cheap to call concurrently.
pub trait Embedder: Send + Sync {
    /// Embed a single text into a vector of `dimension()` components.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving order. Either every text gets a
    /// vector or the whole batch fails; callers rely on this for atomic
    /// document ingestion.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the underlying embedding model.
    fn model(&self) -> &str;

    /// Fixed output dimension; mismatches against the store are fatal
    /// configuration errors.
    fn dimension(&self) -> usize;
}
