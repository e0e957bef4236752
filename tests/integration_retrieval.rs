//! End-to-end retrieval flow against a real on-disk store, with
//! deterministic stand-ins for the embedding and generation capabilities.

use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use docbase::Result;
use docbase::answer::AnswerOrchestrator;
use docbase::chunker::{Chunker, ChunkingConfig};
use docbase::embeddings::Embedder;
use docbase::llm::{GenerationParams, LanguageModel, Prompt};
use docbase::retrieval::RetrievalEngine;
use docbase::store::{DocumentRecord, VectorStore, shared};

const DIM: usize = 16;

/// Deterministic embedder: position-weighted byte sums, so identical texts
/// map to identical vectors and different texts almost surely do not.
struct HashEmbedder;

impl HashEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.01f32; DIM];
        for (i, byte) in text.bytes().enumerate() {
            v[i % DIM] += f32::from(byte) * (1.0 + (i % 7) as f32) / 255.0;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model(&self) -> &str {
        "hash-embed"
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

struct StubModel;

impl LanguageModel for StubModel {
    fn generate(&self, prompt: &Prompt, _params: &GenerationParams) -> Result<String> {
        Ok(format!("answered from {} chars of prompt", prompt.user.len()))
    }

    fn provider(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-model"
    }
}

/// 2,400 characters of varied ASCII so chunk vectors are distinct.
fn sample_text() -> String {
    let mut state = 7u32;
    let mut text = String::with_capacity(2400);
    while text.len() < 2400 {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        let word_len = 3 + (state % 8) as usize;
        for i in 0..word_len {
            if text.len() >= 2400 {
                break;
            }
            let c = b'a' + ((state >> (i % 24)) % 26) as u8;
            text.push(c as char);
        }
        if text.len() < 2400 {
            text.push(' ');
        }
    }
    text.truncate(2400);
    text
}

#[tokio::test]
async fn ingest_then_identity_query_ranks_the_matching_chunk_first() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let text = sample_text();
    assert_eq!(text.chars().count(), 2400);

    let chunker = Chunker::new(ChunkingConfig {
        chunk_size: 1000,
        chunk_overlap: 200,
    })
    .expect("Failed to create chunker");

    let chunks = chunker.chunk_text(&text);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].char_offset, 0);
    assert_eq!(chunks[1].char_offset, 800);
    assert_eq!(chunks[2].char_offset, 1600);

    let embedder = Arc::new(HashEmbedder);
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).expect("Failed to embed");

    let mut store =
        VectorStore::open(dir.path(), "hash-embed", DIM).expect("Failed to open store");
    let document = DocumentRecord {
        file_path: "uploads/sample.txt".to_string(),
        file_name: "sample.txt".to_string(),
        file_type: "txt".to_string(),
        file_size: text.len() as u64,
    };
    store
        .insert(&document, &chunks, &embeddings)
        .expect("Failed to insert");
    store.verify_consistency().expect("store is consistent");

    let store = shared(store);
    let engine = RetrievalEngine::new(embedder, Arc::clone(&store));

    // Query with text identical to the middle chunk.
    let results = engine
        .retrieve(&chunks[1].text, 3, 0.0, &CancellationToken::new())
        .await
        .expect("Failed to retrieve");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].chunk_index, 1);
    assert!(results[0].similarity_score > 0.999);
    assert!(results[0].similarity_score >= results[1].similarity_score);
    assert_eq!(results[0].file_name, "sample.txt");

    // Hand the ranked chunks to the orchestrator for a grounded answer.
    let orchestrator = AnswerOrchestrator::new(Arc::new(StubModel));
    let answer = orchestrator
        .answer(
            "what does the sample say?",
            &results,
            GenerationParams::default(),
            &CancellationToken::new(),
        )
        .await
        .expect("Failed to answer");

    assert_eq!(answer.sources, vec!["sample.txt"]);
    assert_eq!(answer.context_used, 3);
    assert!(answer.answer.starts_with("answered from"));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_delete_never_exposes_a_half_deleted_document() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let embedder = Arc::new(HashEmbedder);

    let mut store =
        VectorStore::open(dir.path(), "hash-embed", DIM).expect("Failed to open store");

    let doc_a_chunks: Vec<docbase::chunker::Chunk> = (0..8)
        .map(|i| docbase::chunker::Chunk {
            text: format!("doc a part {i}"),
            chunk_index: i,
            char_offset: i * 16,
            char_len: 12,
        })
        .collect();
    let doc_a_embeddings: Vec<Vec<f32>> = doc_a_chunks
        .iter()
        .map(|c| HashEmbedder::vector(&c.text))
        .collect();
    store
        .insert(
            &DocumentRecord {
                file_path: "uploads/a.txt".to_string(),
                file_name: "a.txt".to_string(),
                file_type: "txt".to_string(),
                file_size: 128,
            },
            &doc_a_chunks,
            &doc_a_embeddings,
        )
        .expect("Failed to insert");

    let doc_b_chunks = vec![docbase::chunker::Chunk {
        text: "doc b only part".to_string(),
        chunk_index: 0,
        char_offset: 0,
        char_len: 15,
    }];
    store
        .insert(
            &DocumentRecord {
                file_path: "uploads/b.txt".to_string(),
                file_name: "b.txt".to_string(),
                file_type: "txt".to_string(),
                file_size: 15,
            },
            &doc_b_chunks,
            &[HashEmbedder::vector("doc b only part")],
        )
        .expect("Failed to insert");

    let store = shared(store);
    let query = HashEmbedder::vector("doc a part 0");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let query = query.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let results = {
                        let guard = store.read().await;
                        guard.search(&query, 20, 0.0).expect("Failed to search")
                    };
                    let a_chunks = results
                        .iter()
                        .filter(|r| r.file_path == "uploads/a.txt")
                        .count();
                    // Either the full pre-delete view or the full
                    // post-delete view; never something in between.
                    assert!(a_chunks == 8 || a_chunks == 0, "saw {a_chunks} chunks of a.txt");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            let mut guard = store.write().await;
            guard.delete("uploads/a.txt").expect("Failed to delete")
        })
    };

    for reader in readers {
        reader.await.expect("reader panicked");
    }
    assert!(writer.await.expect("writer panicked"));

    let guard = store.read().await;
    assert_eq!(guard.len(), 1);
    guard.verify_consistency().expect("store is consistent");
}

#[tokio::test]
async fn delete_is_idempotent_and_search_survives() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let chunker = Chunker::new(ChunkingConfig::default()).expect("Failed to create chunker");
    let embedder = Arc::new(HashEmbedder);

    let chunks = chunker.chunk_text("a short document that fits one chunk");
    let embeddings = embedder
        .embed_batch(&chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>())
        .expect("Failed to embed");

    let mut store =
        VectorStore::open(dir.path(), "hash-embed", DIM).expect("Failed to open store");
    let document = DocumentRecord {
        file_path: "uploads/short.txt".to_string(),
        file_name: "short.txt".to_string(),
        file_type: "txt".to_string(),
        file_size: 36,
    };
    store
        .insert(&document, &chunks, &embeddings)
        .expect("Failed to insert");

    assert!(store.delete("uploads/short.txt").expect("Failed to delete"));
    assert!(!store.delete("uploads/short.txt").expect("Failed to delete"));
    assert!(store.is_empty());

    let engine = RetrievalEngine::new(embedder, shared(store));
    let results = engine
        .retrieve("anything", 5, 0.0, &CancellationToken::new())
        .await
        .expect("Failed to retrieve");
    assert!(results.is_empty());
}
