// HTTP surface of the engine. Handlers stay thin; every operation delegates
// to the core modules and translates their error taxonomy to status codes.

pub mod routes;


use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::answer::AnswerOrchestrator;
use crate::chunker::Chunker;
use crate::config::Config;
use crate::embeddings::{Embedder, OllamaClient};
use crate::extract::MAX_UPLOAD_BYTES;
use crate::ingest::Ingestor;
use crate::llm::{GroqClient, LanguageModel};
use crate::retrieval::RetrievalEngine;
use crate::storage::StorageManager;
use crate::store::{SharedVectorStore, VectorStore, shared};
use crate::{DocbaseError, Result};

/// Everything a request handler needs, injected rather than global so the
/// locking discipline is visible at call sites and testable in isolation.
pub struct AppState {
    pub store: SharedVectorStore,
    pub retrieval: RetrievalEngine,
    pub orchestrator: Option<AnswerOrchestrator>,
    pub ingestor: Ingestor,
    pub storage: StorageManager,
    pub upload_dir: PathBuf,
    /// Parent token for per-request cancellation; cancelled on shutdown.
    pub cancel: CancellationToken,
}

impl AppState {
    /// Assemble the engine from configuration plus injectable capabilities.
    /// `language_model` is optional so the retrieval surface stays usable
    /// without generation credentials.
    #[inline]
    pub fn new(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        language_model: Option<Arc<dyn LanguageModel>>,
    ) -> Result<Self> {
        let upload_dir = config.upload_path();
        std::fs::create_dir_all(&upload_dir)?;

        let store = shared(VectorStore::open(
            &config.vector_store_path(),
            embedder.model(),
            embedder.dimension(),
        )?);

        let chunker = Chunker::new(config.chunking)?;

        Ok(Self {
            retrieval: RetrievalEngine::new(Arc::clone(&embedder), Arc::clone(&store)),
            orchestrator: language_model.map(AnswerOrchestrator::new),
            ingestor: Ingestor::new(chunker, embedder, Arc::clone(&store)),
            storage: StorageManager::new(&upload_dir),
            store,
            upload_dir,
            cancel: CancellationToken::new(),
        })
    }

    /// Build state with the concrete Ollama and Groq clients from config.
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| DocbaseError::Config(e.to_string()))?;

        let embedder: Arc<dyn Embedder> = Arc::new(OllamaClient::new(&config.ollama)?);

        let language_model: Option<Arc<dyn LanguageModel>> = if config.llm.api_key.is_empty() {
            info!("No LLM API key configured; answer generation disabled");
            None
        } else {
            Some(Arc::new(GroqClient::new(&config.llm)?))
        };

        Self::new(config, embedder, language_model)
    }
}

/// Wire every route to its handler. The body limit leaves headroom above
/// the per-file ceiling for multipart framing.
#[inline]
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/documents/upload", post(routes::upload_document))
        .route("/documents/formats", get(routes::list_formats))
        .route("/search", post(routes::search))
        .route("/search/add", post(routes::add_documents))
        .route("/search/stats", get(routes::store_stats))
        .route("/search/delete", delete(routes::delete_document))
        .route("/search/clear", delete(routes::clear_store))
        .route("/search/storage", get(routes::storage_stats))
        .route("/search/storage/cleanup", post(routes::storage_cleanup))
        .route("/llm/answer", post(routes::generate_answer))
        .route("/llm/model-info", get(routes::model_info))
        .route("/llm/models", get(routes::list_models))
        .layer(DefaultBodyLimit::max(
            usize::try_from(MAX_UPLOAD_BYTES).unwrap_or(usize::MAX).saturating_add(1024 * 1024),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until ctrl-c. In-flight queries observe the cancellation
/// token and stop at the next pipeline stage.
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    let cancel = state.cancel.clone();
    let router = build_router(state);

    let addr = config.server.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            cancel.cancel();
        })
        .await?;

    Ok(())
}
