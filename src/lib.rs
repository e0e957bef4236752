use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocbaseError>;

/// Engine-level error taxonomy. Every variant carries a category the caller
/// can use to choose user messaging and retry eligibility without parsing
/// the message text.
#[derive(Error, Debug)]
pub enum DocbaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl DocbaseError {
    /// Short machine-readable category name, stable across message changes.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Embedding(_) => "embedding",
            Self::Generation(_) => "generation",
            Self::Consistency(_) => "consistency",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
            Self::Other(_) => "internal",
        }
    }

    /// Whether a caller-side bounded retry is reasonable. Only capability
    /// failures qualify; validation-class errors never do.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::Generation(_) | Self::Io(_))
    }
}

pub mod answer;
pub mod chunker;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod ingest;
pub mod llm;
pub(crate) mod net;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod store;
