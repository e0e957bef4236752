
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::chunker::Chunk;
use crate::{DocbaseError, Result};

const ENTRIES_FILE: &str = "entries.json";
const DOCUMENTS_FILE: &str = "documents.json";
const META_FILE: &str = "store.json";
const STORE_VERSION: u32 = 1;

/// Identity and display metadata of a document being inserted. The file path
/// is the document's identity; uploading the same path replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
}

/// One indexed vector. Holds a `(document_id, chunk_index)` back-reference
/// into the document arena plus denormalized copies of the chunk text and
/// document metadata for result display. Never an owning reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub document_id: String,
    pub chunk_index: usize,
    pub file_name: String,
    pub file_type: String,
    pub text: String,
    pub char_len: usize,
    pub embedding: Vec<f32>,
    /// Monotone insertion sequence; ties in similarity rank by this.
    pub seq: u64,
}

/// Per-document arena slot. Deleting a document is one arena removal plus an
/// entry filter, so there is never a dangling back-reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DocumentEntry {
    file_name: String,
    file_type: String,
    file_size: u64,
    chunk_count: usize,
}

/// Read-only projection of a vector entry plus its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    pub chunk_index: usize,
    pub chunk_len: usize,
    pub text: String,
    pub similarity_score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_vectors: usize,
    pub total_documents: usize,
    pub embedding_model: String,
    pub dimension: usize,
    pub store_path: String,
    pub documents: Vec<String>,
    pub storage_size_mb: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreMeta {
    version: u32,
    embedding_model: String,
    dimension: usize,
    total_vectors: usize,
    next_seq: u64,
}

/// In-process vector index with JSON persistence. Owns every indexed chunk
/// vector; insert is atomic per document, delete is idempotent, and search
/// is deterministic (score descending, insertion order on ties).
pub struct VectorStore {
    store_path: PathBuf,
    embedding_model: String,
    dimension: usize,
    documents: HashMap<String, DocumentEntry>,
    entries: Vec<VectorEntry>,
    next_seq: u64,
}

impl VectorStore {
    /// Open (or create) a store at `store_path`. A persisted index with a
    /// different model or dimension than the configuration is rejected;
    /// re-ingesting after a model change requires clearing the store first.
    #[inline]
    pub fn open(store_path: &Path, embedding_model: &str, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(DocbaseError::Config(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        fs::create_dir_all(store_path)?;

        let mut store = Self {
            store_path: store_path.to_path_buf(),
            embedding_model: embedding_model.to_string(),
            dimension,
            documents: HashMap::new(),
            entries: Vec::new(),
            next_seq: 0,
        };

        store.load()?;
        info!(
            "Vector store ready at {} ({} vectors, {} documents)",
            store_path.display(),
            store.entries.len(),
            store.documents.len()
        );
        Ok(store)
    }

    /// Atomically add all vectors for a document, or none. Validation and
    /// dimension checks run before any mutation; a failed insert leaves the
    /// store exactly as it was. Re-inserting an existing document replaces it.
    #[inline]
    pub fn insert(
        &mut self,
        document: &DocumentRecord,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.is_empty() {
            return Err(DocbaseError::Validation(
                "cannot index a document with zero chunks".to_string(),
            ));
        }
        if chunks.len() != embeddings.len() {
            return Err(DocbaseError::Embedding(format!(
                "embedding count ({}) does not match chunk count ({}); nothing was indexed",
                embeddings.len(),
                chunks.len()
            )));
        }
        for embedding in embeddings {
            self.check_dimension(embedding)?;
        }

        // All checks passed; replace any previous version of this document.
        if self.documents.remove(&document.file_path).is_some() {
            self.entries.retain(|e| e.document_id != document.file_path);
            debug!("Replacing previously indexed document {}", document.file_path);
        }

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            self.entries.push(VectorEntry {
                document_id: document.file_path.clone(),
                chunk_index: chunk.chunk_index,
                file_name: document.file_name.clone(),
                file_type: document.file_type.clone(),
                text: chunk.text.clone(),
                char_len: chunk.char_len,
                embedding: embedding.clone(),
                seq: self.next_seq,
            });
            self.next_seq += 1;
        }

        self.documents.insert(
            document.file_path.clone(),
            DocumentEntry {
                file_name: document.file_name.clone(),
                file_type: document.file_type.clone(),
                file_size: document.file_size,
                chunk_count: chunks.len(),
            },
        );

        self.save()?;
        info!(
            "Indexed {} chunks for {} ({} vectors total)",
            chunks.len(),
            document.file_path,
            self.entries.len()
        );
        Ok(())
    }

    /// Return up to `k` entries ranked by similarity, descending, excluding
    /// scores below `score_threshold`. Equal scores rank by insertion order.
    /// An empty store is an empty, non-error result.
    #[inline]
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(DocbaseError::Validation(
                "k must be greater than zero".to_string(),
            ));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx, cosine_similarity(query, &entry.embedding)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.entries[a.0].seq.cmp(&self.entries[b.0].seq))
        });

        let results: Vec<SearchResult> = scored
            .into_iter()
            .filter(|(_, score)| *score >= score_threshold)
            .take(k)
            .map(|(idx, score)| {
                let entry = &self.entries[idx];
                SearchResult {
                    file_path: entry.document_id.clone(),
                    file_name: entry.file_name.clone(),
                    file_type: entry.file_type.clone(),
                    chunk_index: entry.chunk_index,
                    chunk_len: entry.char_len,
                    text: entry.text.clone(),
                    similarity_score: score,
                }
            })
            .collect();

        debug!("Search returned {} results (k={})", results.len(), k);
        Ok(results)
    }

    /// Remove all entries for a document. Idempotent: deleting an absent
    /// document is a no-op reporting `false`.
    #[inline]
    pub fn delete(&mut self, document_id: &str) -> Result<bool> {
        if self.documents.remove(document_id).is_none() {
            return Ok(false);
        }

        self.entries.retain(|e| e.document_id != document_id);
        self.save()?;
        info!("Deleted document {} from vector store", document_id);
        Ok(true)
    }

    /// Remove all entries unconditionally and wipe the persisted files.
    #[inline]
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.documents.clear();
        self.next_seq = 0;

        if self.store_path.exists() {
            fs::remove_dir_all(&self.store_path)?;
        }
        fs::create_dir_all(&self.store_path)?;
        self.save()?;

        info!("Vector store cleared");
        Ok(())
    }

    #[inline]
    pub fn stats(&self) -> Result<StoreStats> {
        let mut documents: Vec<String> = self.documents.keys().cloned().collect();
        documents.sort();

        let storage_bytes = dir_size(&self.store_path)?;

        Ok(StoreStats {
            total_vectors: self.entries.len(),
            total_documents: self.documents.len(),
            embedding_model: self.embedding_model.clone(),
            dimension: self.dimension,
            store_path: self.store_path.to_string_lossy().into_owned(),
            documents,
            storage_size_mb: storage_bytes as f64 / (1024.0 * 1024.0),
        })
    }

    /// Check the core invariant: total entry count equals the sum of chunk
    /// counts across live documents, and every back-reference resolves. A
    /// breach is an internal error for operators, never silently corrected.
    #[inline]
    pub fn verify_consistency(&self) -> Result<()> {
        let expected: usize = self.documents.values().map(|d| d.chunk_count).sum();
        if self.entries.len() != expected {
            error!(
                "Vector store inconsistent: {} entries but documents account for {}",
                self.entries.len(),
                expected
            );
            return Err(DocbaseError::Consistency(format!(
                "vector entry count ({}) does not match document chunk totals ({})",
                self.entries.len(),
                expected
            )));
        }

        if let Some(orphan) = self
            .entries
            .iter()
            .find(|e| !self.documents.contains_key(&e.document_id))
        {
            error!("Orphaned vector entry for {}", orphan.document_id);
            return Err(DocbaseError::Consistency(format!(
                "vector entry references unknown document {}",
                orphan.document_id
            )));
        }

        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn contains_document(&self, document_id: &str) -> bool {
        self.documents.contains_key(document_id)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(DocbaseError::Config(format!(
                "vector has {} dimensions, store expects {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let meta = StoreMeta {
            version: STORE_VERSION,
            embedding_model: self.embedding_model.clone(),
            dimension: self.dimension,
            total_vectors: self.entries.len(),
            next_seq: self.next_seq,
        };

        write_json(&self.store_path.join(META_FILE), &meta)?;
        write_json(&self.store_path.join(DOCUMENTS_FILE), &self.documents)?;
        write_json(&self.store_path.join(ENTRIES_FILE), &self.entries)?;

        debug!("Vector store saved to {}", self.store_path.display());
        Ok(())
    }

    fn load(&mut self) -> Result<()> {
        let meta_path = self.store_path.join(META_FILE);
        if !meta_path.exists() {
            debug!("No persisted vector store at {}", self.store_path.display());
            return Ok(());
        }

        let meta: StoreMeta = read_json(&meta_path)?;
        if meta.dimension != self.dimension {
            return Err(DocbaseError::Config(format!(
                "persisted index has dimension {} but configuration expects {}; clear the store or fix the configuration",
                meta.dimension, self.dimension
            )));
        }
        if meta.embedding_model != self.embedding_model {
            return Err(DocbaseError::Config(format!(
                "persisted index was built with model '{}' but configuration uses '{}'; clear the store and re-ingest",
                meta.embedding_model, self.embedding_model
            )));
        }

        self.documents = read_json(&self.store_path.join(DOCUMENTS_FILE))?;
        self.entries = read_json(&self.store_path.join(ENTRIES_FILE))?;
        self.next_seq = meta.next_seq;

        self.verify_consistency()?;
        Ok(())
    }
}

/// Bounded similarity over equal-dimension vectors; higher is more relevant.
/// Callers validate dimensions up front, so mismatches never reach here.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)
        .map_err(|e| DocbaseError::Other(anyhow::anyhow!("failed to serialize {}: {e}", path.display())))?;
    fs::write(path, json)?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        DocbaseError::Config(format!(
            "persisted store file {} is corrupt: {e}",
            path.display()
        ))
    })
}

fn dir_size(path: &Path) -> Result<u64> {
    let mut total = 0u64;

    if !path.exists() {
        return Ok(0);
    }

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            total += metadata.len();
        } else if metadata.is_dir() {
            total += dir_size(&entry.path())?;
        }
    }

    Ok(total)
}
