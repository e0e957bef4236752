// Language-model capability: turns a prompt into generated text.
// The concrete client speaks the OpenAI-compatible chat completions API.


use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::LlmConfig;
use crate::net::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_TIMEOUT_SECONDS, build_agent, request_with_retry};
use crate::{DocbaseError, Result};

/// Parameters forwarded to the provider for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for GenerationParams {
    #[inline]
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            temperature: 1.0,
        }
    }
}

/// A two-part prompt: fixed system instructions plus the user turn carrying
/// the retrieved context and the question.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

const SYSTEM_PROMPT: &str = "You are an expert AI assistant specializing in document analysis and knowledge extraction.\n\nYour responsibilities:\n- Provide accurate, well-structured answers based solely on the provided context\n- Cite specific information from the context when possible\n- Clearly state when information is insufficient to answer the question\n- Maintain professional, concise communication\n- Focus on factual accuracy over speculation";

/// Assemble the grounded-answer prompt from a query and its retrieved context.
#[inline]
pub fn build_prompt(query: &str, context: &str) -> Prompt {
    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "Context Information:\n{context}\n\nUser Question: {query}\n\nPlease provide a comprehensive answer based on the context above. If the context doesn't contain sufficient information, clearly state this limitation."
        ),
    }
}

/// Capability interface for text-generation providers; one call per answer.
/// Deterministic stubs implement this in tests.
pub trait LanguageModel: Send + Sync {
    fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String>;

    /// Provider identifier, e.g. "groq".
    fn provider(&self) -> &str;

    /// Identifier of the model answering requests.
    fn model(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmModel {
    pub id: String,
    pub name: String,
    pub max_tokens: usize,
}

/// Catalog of models the provider accepts for `/llm/answer` requests.
#[inline]
pub fn supported_models() -> Vec<LlmModel> {
    [
        ("openai/gpt-oss-120b", "OpenAI GPT-OSS 120B", 8192),
        ("llama-3.1-70b-versatile", "LLaMA 3.1 70B Versatile", 8192),
        ("llama-3.1-8b-instant", "LLaMA 3.1 8B Instant", 8192),
        ("mixtral-8x7b-32768", "Mixtral 8x7B", 32_768),
        ("gemma2-9b-it", "Gemma2 9B IT", 8192),
    ]
    .iter()
    .map(|(id, name, max_tokens)| LlmModel {
        id: (*id).to_string(),
        name: (*name).to_string(),
        max_tokens: *max_tokens,
    })
    .collect()
}

/// Chat-completions client for a Groq-compatible endpoint.
#[derive(Debug, Clone)]
pub struct GroqClient {
    api_base: Url,
    api_key: String,
    model: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl GroqClient {
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(DocbaseError::Config(
                "LLM API key required; set GROQ_API_KEY or configure [llm].api_key".to_string(),
            ));
        }

        let api_base = Url::parse(&config.api_base)
            .map_err(|e| DocbaseError::Config(format!("invalid LLM API base URL: {e}")))?;

        let model = if supported_models().iter().any(|m| m.id == config.model) {
            config.model.clone()
        } else {
            LlmConfig::default().model
        };

        Ok(Self {
            api_base,
            api_key: config.api_key.clone(),
            model,
            agent: build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    fn completions_url(&self) -> Result<Url> {
        // Url::join treats a base without trailing slash as a file component
        let base = format!("{}/chat/completions", self.api_base.as_str().trim_end_matches('/'));
        Url::parse(&base)
            .map_err(|e| DocbaseError::Config(format!("failed to build completions URL: {e}")))
    }
}

impl LanguageModel for GroqClient {
    #[inline]
    fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String> {
        debug!(
            "Requesting completion from {} (max_tokens {}, temperature {})",
            self.model, params.max_tokens, params.temperature
        );

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": params.temperature,
            "max_completion_tokens": params.max_tokens,
            "top_p": 1.0,
            "stream": false
        })
        .to_string();

        let url = self.completions_url()?;
        let auth = format!("Bearer {}", self.api_key);

        let response_text = request_with_retry(self.retry_attempts, || {
            self.agent
                .post(url.as_str())
                .header("Authorization", &auth)
                .header("Content-Type", "application/json")
                .send(&body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(DocbaseError::Generation)?;

        let completion: ChatCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| DocbaseError::Generation(format!("failed to parse response: {e}")))?;

        let answer = completion
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| {
                DocbaseError::Generation("no choices in completion response".to_string())
            })?;

        Ok(answer)
    }

    #[inline]
    fn provider(&self) -> &str {
        "groq"
    }

    #[inline]
    fn model(&self) -> &str {
        &self.model
    }
}
