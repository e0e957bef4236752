// Generation path: compose a grounded answer from already-retrieved chunks.


use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::llm::{GenerationParams, LanguageModel, build_prompt};
use crate::store::SearchResult;
use crate::{DocbaseError, Result};

/// Number of top-ranked chunks included in the generation context.
pub const MAX_CONTEXT_CHUNKS: usize = 5;

/// A generated answer plus its attribution. Transient; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
    pub context_used: usize,
    pub num_sources: usize,
    pub llm_type: String,
    pub model_used: String,
}

/// Composes a grounded answer from retrieved chunks. Does not perform its
/// own retrieval; callers retrieve first so they can inspect the chunks
/// before committing to generation.
#[derive(Clone)]
pub struct AnswerOrchestrator {
    model: Arc<dyn LanguageModel>,
}

impl AnswerOrchestrator {
    #[inline]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    #[inline]
    pub fn provider(&self) -> &str {
        self.model.provider()
    }

    #[inline]
    pub fn model_id(&self) -> &str {
        self.model.model()
    }

    /// Build a context window from the top chunks (retrieval order preserved)
    /// and invoke the language model once. Cancellation after the model call
    /// has been dispatched is best-effort: the in-flight call may complete on
    /// the provider side, but its result is discarded.
    #[inline]
    pub async fn answer(
        &self,
        query: &str,
        retrieved_chunks: &[SearchResult],
        params: GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<Answer> {
        if query.trim().is_empty() {
            return Err(DocbaseError::Validation(
                "query text must not be empty".to_string(),
            ));
        }
        if retrieved_chunks.is_empty() {
            return Err(DocbaseError::Validation(
                "no retrieved chunks to answer from; run a search first".to_string(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(DocbaseError::Cancelled);
        }

        let context_chunks = &retrieved_chunks[..retrieved_chunks.len().min(MAX_CONTEXT_CHUNKS)];

        let context = context_chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[Source {}] {}", i + 1, chunk.text))
            .join("\n\n");

        // Attribution covers only the chunks that actually made the context.
        let sources: Vec<String> = context_chunks
            .iter()
            .map(|chunk| chunk.file_name.clone())
            .unique()
            .collect();

        let prompt = build_prompt(query, &context);
        let model = Arc::clone(&self.model);
        let generate_task =
            tokio::task::spawn_blocking(move || model.generate(&prompt, &params));

        let text = tokio::select! {
            () = cancel.cancelled() => {
                debug!("Answer generation cancelled; in-flight model call discarded");
                return Err(DocbaseError::Cancelled);
            }
            joined = generate_task => joined
                .map_err(|e| DocbaseError::Other(anyhow::anyhow!("generation task failed: {e}")))??,
        };

        if text.trim().is_empty() {
            return Err(DocbaseError::Generation(
                "language model returned empty text".to_string(),
            ));
        }

        debug!(
            "Generated answer from {} chunks across {} sources",
            context_chunks.len(),
            sources.len()
        );

        Ok(Answer {
            answer: text,
            context_used: context_chunks.len(),
            num_sources: sources.len(),
            sources,
            llm_type: self.model.provider().to_string(),
            model_used: self.model.model().to_string(),
        })
    }
}
