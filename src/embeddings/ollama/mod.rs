
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::OllamaConfig;
use crate::embeddings::Embedder;
use crate::net::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_TIMEOUT_SECONDS, build_agent, request_with_retry};
use crate::{DocbaseError, Result};

/// Embedding client for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    dimension: usize,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    model: String,
    #[serde(rename = "input")]
    inputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .base_url()
            .map_err(|e| DocbaseError::Config(format!("invalid Ollama URL: {e}")))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            dimension: config.embedding_dimension as usize,
            batch_size: config.batch_size,
            agent: build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Check the server is reachable and the configured model is present.
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        self.ping()?;
        self.validate_model()?;
        info!(
            "Ollama server at {} is healthy with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self.tags_url()?;
        debug!("Pinging Ollama server at {}", url);

        request_with_retry(self.retry_attempts, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(|e| DocbaseError::Embedding(format!("failed to ping Ollama server: {e}")))?;

        Ok(())
    }

    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        let models = self.list_models()?;

        if models.iter().any(|m| m.name == self.model) {
            debug!("Model {} is available", self.model);
            Ok(())
        } else {
            let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available
            );
            Err(DocbaseError::Config(format!(
                "embedding model '{}' is not available; available models: {available:?}",
                self.model
            )))
        }
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.tags_url()?;
        debug!("Fetching available models from {}", url);

        let response_text = request_with_retry(self.retry_attempts, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(|e| DocbaseError::Embedding(format!("failed to fetch models: {e}")))?;

        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| DocbaseError::Embedding(format!("failed to parse models response: {e}")))?;

        Ok(models_response.models)
    }

    fn embed_url(&self) -> Result<Url> {
        self.base_url
            .join("/api/embed")
            .map_err(|e| DocbaseError::Config(format!("failed to build embedding URL: {e}")))
    }

    fn tags_url(&self) -> Result<Url> {
        self.base_url
            .join("/api/tags")
            .map_err(|e| DocbaseError::Config(format!("failed to build tags URL: {e}")))
    }

    fn post_json(&self, url: &Url, body: &str) -> Result<String> {
        request_with_retry(self.retry_attempts, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(DocbaseError::Embedding)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(DocbaseError::Config(format!(
                "embedding model '{}' returned {} dimensions, expected {}",
                self.model,
                embedding.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.len() == 1 {
            return Ok(vec![self.embed(&texts[0])?]);
        }

        let request = BatchEmbedRequest {
            model: self.model.clone(),
            inputs: texts.to_vec(),
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| DocbaseError::Embedding(format!("failed to serialize request: {e}")))?;

        let url = self.embed_url()?;
        let response_text = self.post_json(&url, &request_json)?;

        let batch_response: BatchEmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| DocbaseError::Embedding(format!("failed to parse batch response: {e}")))?;

        if batch_response.embeddings.len() != texts.len() {
            return Err(DocbaseError::Embedding(format!(
                "mismatch between request and response counts: {} vs {}",
                texts.len(),
                batch_response.embeddings.len()
            )));
        }

        for embedding in &batch_response.embeddings {
            self.check_dimension(embedding)?;
        }

        Ok(batch_response.embeddings)
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| DocbaseError::Embedding(format!("failed to serialize request: {e}")))?;

        let url = self.embed_url()?;
        let response_text = self.post_json(&url, &request_json)?;

        let embed_response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| DocbaseError::Embedding(format!("failed to parse response: {e}")))?;

        self.check_dimension(&embed_response.embedding)?;
        Ok(embed_response.embedding)
    }

    /// Processes the inputs in server-sized batches so a long document does
    /// not overwhelm the embedding server with one request.
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size as usize) {
            results.extend(self.embed_single_batch(chunk)?);
        }

        Ok(results)
    }

    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }
}
