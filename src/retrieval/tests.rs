use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

use crate::chunker::Chunk;
use crate::store::{DocumentRecord, VectorStore, shared};

const DIM: usize = 3;

/// Deterministic embedder: known texts map to fixed vectors, everything
/// else to a default.
struct StubEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl StubEmbedder {
    fn new(pairs: &[(&str, [f32; DIM])]) -> Self {
        Self {
            vectors: pairs
                .iter()
                .map(|(text, v)| ((*text).to_string(), v.to_vec()))
                .collect(),
        }
    }
}

impl Embedder for StubEmbedder {
    fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
    }

    fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn model(&self) -> &str {
        "stub-embed"
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> crate::Result<Vec<f32>> {
        Err(DocbaseError::Embedding("service unavailable".to_string()))
    }

    fn embed_batch(&self, _texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        Err(DocbaseError::Embedding("service unavailable".to_string()))
    }

    fn model(&self) -> &str {
        "failing-embed"
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

fn seeded_store(dir: &TempDir) -> SharedVectorStore {
    let mut store =
        VectorStore::open(dir.path(), "stub-embed", DIM).expect("Failed to open store");
    let document = DocumentRecord {
        file_path: "notes.txt".to_string(),
        file_name: "notes.txt".to_string(),
        file_type: "txt".to_string(),
        file_size: 10,
    };
    let chunks = vec![
        Chunk {
            text: "apples".to_string(),
            chunk_index: 0,
            char_offset: 0,
            char_len: 6,
        },
        Chunk {
            text: "oranges".to_string(),
            chunk_index: 1,
            char_offset: 6,
            char_len: 7,
        },
    ];
    store
        .insert(
            &document,
            &chunks,
            &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
        )
        .expect("Failed to insert");
    shared(store)
}

#[tokio::test]
async fn retrieve_ranks_by_similarity() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let embedder = Arc::new(StubEmbedder::new(&[("apples", [1.0, 0.0, 0.0])]));
    let engine = RetrievalEngine::new(embedder, seeded_store(&dir));

    let results = engine
        .retrieve("apples", 5, 0.0, &CancellationToken::new())
        .await
        .expect("Failed to retrieve");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text, "apples");
    assert!(results[0].similarity_score > 0.99);
}

#[tokio::test]
async fn empty_query_is_a_validation_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let engine = RetrievalEngine::new(Arc::new(FailingEmbedder), seeded_store(&dir));

    // Validation fires before the embedder is consulted, so the failing
    // embedder never gets a chance to report its own error.
    let result = engine.retrieve("   ", 5, 0.0, &CancellationToken::new()).await;
    assert!(matches!(result, Err(DocbaseError::Validation(_))));
}

#[tokio::test]
async fn zero_k_is_a_validation_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let engine = RetrievalEngine::new(Arc::new(FailingEmbedder), seeded_store(&dir));

    let result = engine.retrieve("apples", 0, 0.0, &CancellationToken::new()).await;
    assert!(matches!(result, Err(DocbaseError::Validation(_))));
}

#[tokio::test]
async fn embedder_failure_propagates() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let engine = RetrievalEngine::new(Arc::new(FailingEmbedder), seeded_store(&dir));

    let result = engine.retrieve("apples", 5, 0.0, &CancellationToken::new()).await;
    assert!(matches!(result, Err(DocbaseError::Embedding(_))));
}

#[tokio::test]
async fn raising_threshold_never_increases_count() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let embedder = Arc::new(StubEmbedder::new(&[("apples", [1.0, 0.1, 0.0])]));
    let engine = RetrievalEngine::new(embedder, seeded_store(&dir));
    let cancel = CancellationToken::new();

    let mut previous = usize::MAX;
    for threshold in [0.0, 0.25, 0.5, 0.75, 0.95] {
        let count = engine
            .retrieve("apples", 10, threshold, &cancel)
            .await
            .expect("Failed to retrieve")
            .len();
        assert!(count <= previous);
        previous = count;
    }
}

#[tokio::test]
async fn cancelled_token_short_circuits() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let embedder = Arc::new(StubEmbedder::new(&[]));
    let engine = RetrievalEngine::new(embedder, seeded_store(&dir));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = engine.retrieve("apples", 5, 0.0, &cancel).await;
    assert!(matches!(result, Err(DocbaseError::Cancelled)));
}

#[tokio::test]
async fn no_relevant_content_is_empty_not_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    // Query vector orthogonal to everything indexed.
    let embedder = Arc::new(StubEmbedder::new(&[("unrelated", [0.0, 0.0, 1.0])]));
    let engine = RetrievalEngine::new(embedder, seeded_store(&dir));

    let results = engine
        .retrieve("unrelated", 5, 0.5, &CancellationToken::new())
        .await
        .expect("Failed to retrieve");
    assert!(results.is_empty());
}
