// Request handlers. Each one validates, delegates to a core module, and
// maps the error taxonomy onto HTTP status codes.

use axum::Json;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::answer::Answer;
use crate::extract::{MAX_UPLOAD_BYTES, SupportedFormat, detect_extension, supported_formats};
use crate::ingest::IngestedDocument;
use crate::llm::{GenerationParams, LlmModel};
use crate::retrieval::{DEFAULT_SCORE_THRESHOLD, DEFAULT_TOP_K};
use crate::storage::{StorageStats, CleanupReport};
use crate::store::{SearchResult, StoreStats};
use crate::DocbaseError;

use super::AppState;

/// Engine error translated to a response. Validation-class failures are the
/// client's fault; capability failures surface as bad gateway so callers
/// can distinguish "you sent garbage" from "a dependency is down".
pub struct ApiError(DocbaseError);

impl From<DocbaseError> for ApiError {
    #[inline]
    fn from(err: DocbaseError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DocbaseError::Validation(_) => StatusCode::BAD_REQUEST,
            DocbaseError::NotFound(_) => StatusCode::NOT_FOUND,
            DocbaseError::Embedding(_) | DocbaseError::Generation(_) => StatusCode::BAD_GATEWAY,
            DocbaseError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            DocbaseError::Config(_)
            | DocbaseError::Consistency(_)
            | DocbaseError::Io(_)
            | DocbaseError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed ({}): {}", self.0.category(), self.0);
        } else {
            warn!("Request rejected ({}): {}", self.0.category(), self.0);
        }

        let body = json!({
            "success": false,
            "message": self.0.to_string(),
            "category": self.0.category(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub document: IngestedDocument,
}

/// Accept one multipart file field, save it under the upload directory with
/// a unique prefix, and run the ingestion pipeline. A failed ingestion
/// removes the saved file so storage accounting never counts half-ingested
/// uploads.
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        DocbaseError::Validation(format!("malformed multipart request: {e}"))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(ToString::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                DocbaseError::Validation("upload field is missing a file name".to_string())
            })?;

        // Reject unsupported types before buffering the body.
        detect_extension(&file_name)?;

        let bytes = field.bytes().await.map_err(|e| {
            DocbaseError::Validation(format!("failed to read upload: {e}"))
        })?;

        if bytes.len() as u64 > MAX_UPLOAD_BYTES {
            return Err(DocbaseError::Validation(format!(
                "file {} is {} bytes, exceeding the {} byte limit",
                file_name,
                bytes.len(),
                MAX_UPLOAD_BYTES
            ))
            .into());
        }

        let saved_path = state
            .upload_dir
            .join(format!("{}_{file_name}", Uuid::new_v4()));
        tokio::fs::write(&saved_path, &bytes)
            .await
            .map_err(DocbaseError::Io)?;

        // The unique storage name must not leak into display metadata.
        match state
            .ingestor
            .ingest_file_named(&saved_path, &file_name)
            .await
        {
            Ok(document) => {
                return Ok(Json(UploadResponse {
                    success: true,
                    document,
                }));
            }
            Err(e) => {
                if let Err(cleanup_err) = tokio::fs::remove_file(&saved_path).await {
                    warn!(
                        "Failed to remove {} after ingestion error: {cleanup_err}",
                        saved_path.display()
                    );
                }
                return Err(e.into());
            }
        }
    }

    Err(DocbaseError::Validation("no file field in upload".to_string()).into())
}

#[derive(Debug, Serialize)]
pub struct FormatsResponse {
    pub formats: Vec<SupportedFormat>,
}

pub async fn list_formats() -> Json<FormatsResponse> {
    Json(FormatsResponse {
        formats: supported_formats(),
    })
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub k: Option<i64>,
    pub score_threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub query: String,
    pub count: usize,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let k = validate_k(request.k)?;
    let threshold = request.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD);

    let cancel = state.cancel.child_token();
    let results = state
        .retrieval
        .retrieve(&request.query, k, threshold, &cancel)
        .await?;

    Ok(Json(SearchResponse {
        count: results.len(),
        results,
        query: request.query,
    }))
}

fn default_file_type() -> String {
    "txt".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AddDocumentRequest {
    pub file_path: String,
    pub file_name: Option<String>,
    #[serde(default = "default_file_type")]
    pub file_type: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AddDocumentsResponse {
    pub success: bool,
    pub message: String,
    pub documents: Vec<IngestedDocument>,
}

/// Index text handed over directly, bypassing the upload step. Each
/// document commits atomically; the first failure aborts the rest.
pub async fn add_documents(
    State(state): State<Arc<AppState>>,
    Json(requests): Json<Vec<AddDocumentRequest>>,
) -> ApiResult<Json<AddDocumentsResponse>> {
    if requests.is_empty() {
        return Err(
            DocbaseError::Validation("no documents in request body".to_string()).into(),
        );
    }

    let mut documents = Vec::with_capacity(requests.len());
    for request in requests {
        let display_name = request.file_name.as_deref().unwrap_or(&request.file_path);
        let document = state
            .ingestor
            .ingest_text(
                &request.file_path,
                display_name,
                &request.file_type,
                &request.text,
            )
            .await?;
        documents.push(document);
    }

    Ok(Json(AddDocumentsResponse {
        success: true,
        message: format!("Added {} documents to vector store", documents.len()),
        documents,
    }))
}

pub async fn store_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<StoreStats>> {
    let store = state.store.read().await;
    store.verify_consistency()?;
    Ok(Json(store.stats()?))
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub file_path: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<Json<DeleteResponse>> {
    let removed = state.store.write().await.delete(&params.file_path)?;
    if !removed {
        return Err(DocbaseError::NotFound(format!(
            "document {} is not indexed",
            params.file_path
        ))
        .into());
    }

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("deleted {}", params.file_path),
    }))
}

pub async fn clear_store(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<serde_json::Value>> {
    state.store.write().await.clear()?;
    Ok(Json(json!({"success": true})))
}

pub async fn storage_stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<StorageStats>> {
    let storage = state.storage.clone();
    let stats = tokio::task::spawn_blocking(move || storage.stats())
        .await
        .map_err(|e| DocbaseError::Other(anyhow::anyhow!("storage task failed: {e}")))??;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub deleted_files: usize,
    pub freed_space_bytes: u64,
    pub freed_space_mb: f64,
}

impl From<CleanupReport> for CleanupResponse {
    #[inline]
    fn from(report: CleanupReport) -> Self {
        Self {
            success: true,
            deleted_files: report.deleted_files,
            freed_space_bytes: report.freed_space_bytes,
            freed_space_mb: report.freed_space_bytes as f64 / (1024.0 * 1024.0),
        }
    }
}

pub async fn storage_cleanup(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CleanupResponse>> {
    let storage = state.storage.clone();
    let report = tokio::task::spawn_blocking(move || storage.cleanup())
        .await
        .map_err(|e| DocbaseError::Other(anyhow::anyhow!("cleanup task failed: {e}")))??;
    Ok(Json(report.into()))
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub query: String,
    /// Pre-retrieved chunks; when absent the server retrieves with the
    /// parameters below.
    pub chunks: Option<Vec<SearchResult>>,
    pub k: Option<i64>,
    pub score_threshold: Option<f32>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

pub async fn generate_answer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnswerRequest>,
) -> ApiResult<Json<Answer>> {
    let orchestrator = state.orchestrator.as_ref().ok_or_else(|| {
        DocbaseError::Config(
            "answer generation is disabled; no LLM API key configured".to_string(),
        )
    })?;

    let cancel = state.cancel.child_token();

    let chunks = match request.chunks {
        Some(chunks) => chunks,
        None => {
            let k = validate_k(request.k)?;
            let threshold = request.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD);
            state
                .retrieval
                .retrieve(&request.query, k, threshold, &cancel)
                .await?
        }
    };

    if chunks.is_empty() {
        return Err(DocbaseError::Validation(
            "no relevant content found for this query".to_string(),
        )
        .into());
    }

    let defaults = GenerationParams::default();
    let params = GenerationParams {
        max_tokens: request.max_tokens.unwrap_or(defaults.max_tokens),
        temperature: request.temperature.unwrap_or(defaults.temperature),
    };

    let answer = orchestrator
        .answer(&request.query, &chunks, params, &cancel)
        .await?;
    Ok(Json(answer))
}

pub async fn list_models() -> Json<Vec<LlmModel>> {
    Json(crate::llm::supported_models())
}

/// Describe the model currently answering requests.
pub async fn model_info(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<serde_json::Value>> {
    let orchestrator = state.orchestrator.as_ref().ok_or_else(|| {
        DocbaseError::Config(
            "answer generation is disabled; no LLM API key configured".to_string(),
        )
    })?;

    Ok(Json(json!({
        "provider": orchestrator.provider(),
        "model": orchestrator.model_id(),
        "supports_streaming": false,
        "max_tokens": GenerationParams::default().max_tokens,
    })))
}

fn validate_k(k: Option<i64>) -> Result<usize, ApiError> {
    match k {
        None => Ok(DEFAULT_TOP_K),
        Some(k) if k > 0 => Ok(usize::try_from(k).unwrap_or(usize::MAX)),
        Some(k) => Err(DocbaseError::Validation(format!(
            "k must be greater than zero, got {k}"
        ))
        .into()),
    }
}
