// Vector index: the single source of truth for what is currently searchable.

pub mod vector_store;

pub use vector_store::{
    DocumentRecord, SearchResult, StoreStats, VectorEntry, VectorStore, cosine_similarity,
};

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle used by request handlers: many concurrent readers, writers
/// exclusive, so a reader never observes a half-applied insert/delete/clear.
pub type SharedVectorStore = Arc<RwLock<VectorStore>>;

/// Wrap a store for sharing across request tasks.
#[inline]
pub fn shared(store: VectorStore) -> SharedVectorStore {
    Arc::new(RwLock::new(store))
}
