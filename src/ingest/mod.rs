// Write path of the engine: file on disk in, atomically indexed document out.

#[cfg(test)]
mod tests;

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::chunker::Chunker;
use crate::embeddings::Embedder;
use crate::extract::{MAX_UPLOAD_BYTES, detect_extension, extract_text};
use crate::store::{DocumentRecord, SharedVectorStore};
use crate::{DocbaseError, Result};

/// Outcome of a successful ingestion, echoed back to the uploader.
#[derive(Debug, Clone, Serialize)]
pub struct IngestedDocument {
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub chunk_count: usize,
}

/// Runs the ingestion pipeline: validate, extract, chunk, embed, commit.
/// A document either becomes fully searchable or leaves no trace; any
/// failure before the final commit aborts without touching the store.
#[derive(Clone)]
pub struct Ingestor {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    store: SharedVectorStore,
}

impl Ingestor {
    #[inline]
    pub fn new(chunker: Chunker, embedder: Arc<dyn Embedder>, store: SharedVectorStore) -> Self {
        Self {
            chunker,
            embedder,
            store,
        }
    }

    /// Ingest one file already saved under the upload directory, using the
    /// file's own name as the display name. `file_path` becomes the
    /// document's identity; re-ingesting the same path replaces the
    /// previous version.
    #[inline]
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestedDocument> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DocbaseError::Validation(format!("invalid file path: {}", path.display()))
            })?
            .to_string();

        self.ingest_file_named(path, &file_name).await
    }

    /// Ingest one file with an explicit display name. Uploads save under a
    /// unique storage name, so the display name shown in search results and
    /// answer attribution must come from the caller, not the storage path.
    #[inline]
    pub async fn ingest_file_named(
        &self,
        path: &Path,
        display_name: &str,
    ) -> Result<IngestedDocument> {
        let file_name = display_name.to_string();
        let extension = detect_extension(&file_name)?;

        let metadata = tokio::fs::metadata(path).await?;
        if metadata.len() > MAX_UPLOAD_BYTES {
            return Err(DocbaseError::Validation(format!(
                "file {} is {} bytes, exceeding the {} byte limit",
                file_name,
                metadata.len(),
                MAX_UPLOAD_BYTES
            )));
        }

        let document = DocumentRecord {
            file_path: path.to_string_lossy().into_owned(),
            file_name: file_name.clone(),
            file_type: extension.clone(),
            file_size: metadata.len(),
        };

        // Extraction and embedding are blocking work; keep them off the
        // async worker threads.
        let extract_path = path.to_path_buf();
        let extract_ext = extension.clone();
        let text = tokio::task::spawn_blocking(move || extract_text(&extract_path, &extract_ext))
            .await
            .map_err(|e| DocbaseError::Other(anyhow::anyhow!("extraction task failed: {e}")))??;

        if text.trim().is_empty() {
            return Err(DocbaseError::Validation(format!(
                "file {file_name} contains no extractable text"
            )));
        }

        let chunks = self.chunker.chunk_text(&text);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let embedder = Arc::clone(&self.embedder);
        let embeddings = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| DocbaseError::Other(anyhow::anyhow!("embedding task failed: {e}")))??;

        // Single commit point; the write lock is held only for the insert.
        {
            let mut store = self.store.write().await;
            store.insert(&document, &chunks, &embeddings)?;
        }

        info!(
            "Ingested {} ({} chunks, {} bytes)",
            document.file_path,
            chunks.len(),
            document.file_size
        );

        Ok(IngestedDocument {
            file_path: document.file_path,
            file_name: document.file_name,
            file_type: document.file_type,
            file_size: document.file_size,
            chunk_count: chunks.len(),
        })
    }

    /// Index text handed over directly, without a backing upload. The
    /// caller supplies the document identity and display metadata; the text
    /// goes through the same chunk/embed/commit pipeline as a file.
    #[inline]
    pub async fn ingest_text(
        &self,
        document_id: &str,
        display_name: &str,
        file_type: &str,
        text: &str,
    ) -> Result<IngestedDocument> {
        if document_id.trim().is_empty() {
            return Err(DocbaseError::Validation(
                "document file_path must not be empty".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(DocbaseError::Validation(format!(
                "document {document_id} contains no text"
            )));
        }
        if text.len() as u64 > MAX_UPLOAD_BYTES {
            return Err(DocbaseError::Validation(format!(
                "document {} is {} bytes, exceeding the {} byte limit",
                document_id,
                text.len(),
                MAX_UPLOAD_BYTES
            )));
        }

        let document = DocumentRecord {
            file_path: document_id.to_string(),
            file_name: if display_name.trim().is_empty() {
                document_id.to_string()
            } else {
                display_name.to_string()
            },
            file_type: file_type.to_string(),
            file_size: text.len() as u64,
        };

        let chunks = self.chunker.chunk_text(text);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let embedder = Arc::clone(&self.embedder);
        let embeddings = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| DocbaseError::Other(anyhow::anyhow!("embedding task failed: {e}")))??;

        {
            let mut store = self.store.write().await;
            store.insert(&document, &chunks, &embeddings)?;
        }

        info!(
            "Indexed {} directly ({} chunks, {} bytes)",
            document.file_path,
            chunks.len(),
            document.file_size
        );

        Ok(IngestedDocument {
            file_path: document.file_path,
            file_name: document.file_name,
            file_type: document.file_type,
            file_size: document.file_size,
            chunk_count: chunks.len(),
        })
    }
}
