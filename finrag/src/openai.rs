//! OpenAI-backed embedding and completion adapters.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::{CompletionRequest, CompletionService};
use crate::embedding::EmbeddingProvider;
use crate::error::{FinRagError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "gpt-4";

/// Connection details shared by both adapters.
#[derive(Clone)]
struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    fn new(service: &str, api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(FinRagError::external(service, "OpenAI API key must not be empty"));
        }
        Ok(Self { http: reqwest::Client::new(), api_key, base_url: DEFAULT_BASE_URL.into() })
    }

    fn from_env(service: &str) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            FinRagError::external(service, "OPENAI_API_KEY environment variable not set")
        })?;
        Self::new(service, api_key)
    }

    async fn post<B, R>(&self, service: &str, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{path}", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(service, error = %e, "OpenAI request failed");
                FinRagError::external(service, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
            error!(service, %status, "OpenAI API error");
            return Err(FinRagError::external(service, format!("API returned {status}: {detail}")));
        }

        response.json().await.map_err(|e| {
            error!(service, error = %e, "failed to parse OpenAI response");
            FinRagError::external(service, format!("failed to parse response: {e}"))
        })
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] calling `/v1/embeddings`.
///
/// ```rust,ignore
/// let provider = OpenAIEmbeddingProvider::from_env()?;
/// let index = InMemoryVectorIndex::new(Arc::new(provider));
/// ```
pub struct OpenAIEmbeddingProvider {
    client: OpenAIClient,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbeddingProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: OpenAIClient::new("embedding", api_key.into())?,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        })
    }

    /// Read the key from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client: OpenAIClient::from_env("embedding")?,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        })
    }

    /// Use another embedding model. `dimensions` must match its output size.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Point at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FinRagError::external("embedding", "API returned no embeddings"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(batch_size = texts.len(), model = %self.model, "embedding batch");

        let request = EmbeddingRequest { model: &self.model, input: texts };
        let response: EmbeddingResponse =
            self.client.post("embedding", "embeddings", &request).await?;
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Chat completions ───────────────────────────────────────────────

/// A [`CompletionService`] calling `/v1/chat/completions`.
pub struct OpenAICompletion {
    client: OpenAIClient,
    model: String,
}

impl OpenAICompletion {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self { client: OpenAIClient::new("completion", api_key.into())?, model: DEFAULT_CHAT_MODEL.into() })
    }

    /// Read the key from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self { client: OpenAIClient::from_env("completion")?, model: DEFAULT_CHAT_MODEL.into() })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionService for OpenAICompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        debug!(model = %self.model, temperature = request.temperature, "requesting completion");
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: &request.system_instruction },
                ChatMessage { role: "user", content: &request.user_content },
            ],
            temperature: request.temperature,
        };
        let response: ChatResponse = self.client.post("completion", "chat/completions", &body).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| FinRagError::external("completion", "API returned no message content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            OpenAICompletion::new(""),
            Err(FinRagError::ExternalService { service, .. }) if service == "completion"
        ));
        assert!(OpenAIEmbeddingProvider::new("").is_err());
    }

    #[test]
    fn chat_request_shape() {
        let body = ChatRequest {
            model: "gpt-4",
            messages: [
                ChatMessage { role: "system", content: "sys" },
                ChatMessage { role: "user", content: "hi" },
            ],
            temperature: 0.5,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert_eq!(value["temperature"], 0.5);
    }
}
