use super::*;
use std::io::Write;
use tempfile::TempDir;

use crate::chunker::ChunkingConfig;
use crate::store::{VectorStore, shared};

const DIM: usize = 4;

/// Hash-based deterministic embedder so identical texts always map to
/// identical vectors.
struct HashEmbedder;

impl HashEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for (i, byte) in text.bytes().enumerate() {
            v[i % DIM] += f32::from(byte) / 255.0;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model(&self) -> &str {
        "hash-embed"
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> crate::Result<Vec<f32>> {
        Err(DocbaseError::Embedding("service down".to_string()))
    }

    fn embed_batch(&self, _texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        Err(DocbaseError::Embedding("service down".to_string()))
    }

    fn model(&self) -> &str {
        "failing-embed"
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("Failed to create file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write file");
    path
}

fn ingestor(dir: &TempDir, embedder: Arc<dyn Embedder>) -> (Ingestor, SharedVectorStore) {
    let store = shared(
        VectorStore::open(&dir.path().join("vectors"), "hash-embed", DIM)
            .expect("Failed to open store"),
    );
    let chunker = Chunker::new(ChunkingConfig {
        chunk_size: 100,
        chunk_overlap: 20,
    })
    .expect("Failed to create chunker");
    (
        Ingestor::new(chunker, embedder, Arc::clone(&store)),
        store,
    )
}

#[tokio::test]
async fn ingests_and_indexes_a_text_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (ingestor, store) = ingestor(&dir, Arc::new(HashEmbedder));
    let path = write_file(&dir, "notes.txt", &"sample content ".repeat(20));

    let ingested = ingestor.ingest_file(&path).await.expect("Failed to ingest");

    assert_eq!(ingested.file_name, "notes.txt");
    assert_eq!(ingested.file_type, "txt");
    assert!(ingested.chunk_count > 1);

    let store = store.read().await;
    assert_eq!(store.len(), ingested.chunk_count);
    assert!(store.contains_document(&ingested.file_path));
    store.verify_consistency().expect("store is consistent");
}

#[tokio::test]
async fn unsupported_extension_is_rejected_before_reading() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (ingestor, store) = ingestor(&dir, Arc::new(HashEmbedder));
    let path = write_file(&dir, "binary.exe", "not text");

    let result = ingestor.ingest_file(&path).await;
    assert!(matches!(result, Err(DocbaseError::Validation(_))));
    assert!(store.read().await.is_empty());
}

#[tokio::test]
async fn empty_file_is_a_validation_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (ingestor, store) = ingestor(&dir, Arc::new(HashEmbedder));
    let path = write_file(&dir, "empty.txt", "   \n  ");

    let result = ingestor.ingest_file(&path).await;
    assert!(matches!(result, Err(DocbaseError::Validation(_))));
    assert!(store.read().await.is_empty());
}

#[tokio::test]
async fn embedding_failure_leaves_no_trace() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (ingestor, store) = ingestor(&dir, Arc::new(FailingEmbedder));
    let path = write_file(&dir, "notes.txt", "some text worth indexing");

    let result = ingestor.ingest_file(&path).await;
    assert!(matches!(result, Err(DocbaseError::Embedding(_))));

    let store = store.read().await;
    assert!(store.is_empty());
    assert_eq!(store.document_count(), 0);
}

#[tokio::test]
async fn reingesting_replaces_the_document() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (ingestor, store) = ingestor(&dir, Arc::new(HashEmbedder));
    let path = write_file(&dir, "notes.txt", &"first version ".repeat(20));

    let first = ingestor.ingest_file(&path).await.expect("Failed to ingest");

    std::fs::write(&path, "second version, much shorter").expect("Failed to rewrite");
    let second = ingestor.ingest_file(&path).await.expect("Failed to reingest");

    assert_eq!(second.chunk_count, 1);
    assert_ne!(first.chunk_count, second.chunk_count);

    let store = store.read().await;
    assert_eq!(store.document_count(), 1);
    assert_eq!(store.len(), second.chunk_count);
}

#[tokio::test]
async fn display_name_survives_a_mangled_storage_name() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (ingestor, store) = ingestor(&dir, Arc::new(HashEmbedder));
    // Uploads land under a unique storage name; the display name is the
    // caller's original file name.
    let path = write_file(&dir, "c4ae1b52_report.txt", "quarterly revenue figures");

    let ingested = ingestor
        .ingest_file_named(&path, "report.txt")
        .await
        .expect("Failed to ingest");

    assert_eq!(ingested.file_name, "report.txt");
    assert!(ingested.file_path.ends_with("c4ae1b52_report.txt"));

    let store = store.read().await;
    let results = store
        .search(&HashEmbedder::vector("quarterly revenue figures"), 1, 0.0)
        .expect("Failed to search");
    assert_eq!(results[0].file_name, "report.txt");
    assert!(results[0].file_path.ends_with("c4ae1b52_report.txt"));
}

#[tokio::test]
async fn ingest_text_indexes_without_a_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (ingestor, store) = ingestor(&dir, Arc::new(HashEmbedder));

    let ingested = ingestor
        .ingest_text("notes/inline", "inline notes", "txt", "directly submitted text")
        .await
        .expect("Failed to ingest");

    assert_eq!(ingested.file_path, "notes/inline");
    assert_eq!(ingested.file_name, "inline notes");
    assert_eq!(ingested.chunk_count, 1);

    let store = store.read().await;
    assert!(store.contains_document("notes/inline"));
}

#[tokio::test]
async fn ingest_text_rejects_empty_input() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (ingestor, _store) = ingestor(&dir, Arc::new(HashEmbedder));

    let result = ingestor.ingest_text("doc", "doc", "txt", "   ").await;
    assert!(matches!(result, Err(DocbaseError::Validation(_))));

    let result = ingestor.ingest_text("  ", "doc", "txt", "text").await;
    assert!(matches!(result, Err(DocbaseError::Validation(_))));
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (ingestor, _store) = ingestor(&dir, Arc::new(HashEmbedder));

    let result = ingestor.ingest_file(&dir.path().join("gone.txt")).await;
    assert!(matches!(result, Err(DocbaseError::Io(_))));
}
