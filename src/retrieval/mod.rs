// Read path of the engine: query text in, ranked thresholded chunks out.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::embeddings::Embedder;
use crate::store::{SearchResult, SharedVectorStore};
use crate::{DocbaseError, Result};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.0;

/// Turns a user query into ranked, thresholded, attributable results. Owns
/// no state of its own; the embedder and store handles are shared with the
/// rest of the engine.
#[derive(Clone)]
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    store: SharedVectorStore,
}

impl RetrievalEngine {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, store: SharedVectorStore) -> Self {
        Self { embedder, store }
    }

    /// Embed the query and search the store. An empty result is a valid
    /// outcome ("no sufficiently relevant content"), never an error. The
    /// cancellation token is checked between pipeline stages; a cancelled
    /// retrieval returns without touching shared state.
    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        score_threshold: f32,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(DocbaseError::Validation(
                "query text must not be empty".to_string(),
            ));
        }
        if k == 0 {
            return Err(DocbaseError::Validation(
                "k must be greater than zero".to_string(),
            ));
        }

        if cancel.is_cancelled() {
            return Err(DocbaseError::Cancelled);
        }

        let embedder = Arc::clone(&self.embedder);
        let query_text = query.to_string();
        let embed_task = tokio::task::spawn_blocking(move || embedder.embed(&query_text));

        let query_vector = tokio::select! {
            () = cancel.cancelled() => return Err(DocbaseError::Cancelled),
            joined = embed_task => joined
                .map_err(|e| DocbaseError::Other(anyhow::anyhow!("embedding task failed: {e}")))??,
        };

        if cancel.is_cancelled() {
            return Err(DocbaseError::Cancelled);
        }

        let store = self.store.read().await;
        let results = store.search(&query_vector, k, score_threshold)?;
        debug!(
            "Retrieved {} chunks for query (k={}, threshold={})",
            results.len(),
            k,
            score_threshold
        );
        Ok(results)
    }
}
