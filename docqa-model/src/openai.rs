//! OpenAI provider, also used for OpenAI-compatible local servers.
//!
//! Talks to `/embeddings` and `/chat/completions` with `reqwest`. Pointing
//! the base URL at a llama.cpp server or Ollama's `/v1` endpoint gives the
//! [`ProviderKind::Local`](crate::ProviderKind::Local) flavour, which sends
//! no `Authorization` header unless a key was configured.

use async_trait::async_trait;
use docqa_core::{CompletionRequest, DocqaError, ModelProvider, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ProviderConfig, ProviderKind};
use crate::http::{build_client, classify_transport, read_json};

/// A [`ModelProvider`] backed by the OpenAI REST API or a compatible server.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_model::{OpenAIProvider, ProviderConfig, ProviderKind};
///
/// let provider = OpenAIProvider::from_config(
///     &ProviderConfig::new(ProviderKind::OpenAi).with_api_key("sk-..."),
/// )?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIProvider {
    client: reqwest::Client,
    name: &'static str,
    base_url: String,
    api_key: Option<String>,
    embedding_model: String,
    completion_model: String,
}

impl OpenAIProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let name = match config.kind {
            ProviderKind::Local => "Local",
            _ => "OpenAI",
        };
        Ok(Self {
            client: build_client(name, config.timeout)?,
            name,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key: config.resolve_api_key()?,
            embedding_model: config.embedding_model().to_string(),
            completion_model: config.completion_model().to_string(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}/{path}", self.base_url));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

// ── OpenAI API request/response types ──────────────────────────────

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
    #[serde(default)]
    index: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body).ok().map(|e| e.error.message)
}

fn chat_request<'a>(model: &'a str, request: &'a CompletionRequest) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(ChatMessage { role: "system", content: system });
    }
    messages.push(ChatMessage { role: "user", content: &request.prompt });
    ChatRequest {
        model,
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

fn into_vectors(
    provider: &str,
    mut response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>> {
    response.data.sort_by_key(|d| d.index);
    if response.data.len() != expected {
        return Err(DocqaError::provider(
            provider,
            format!("API returned {} embeddings for {expected} inputs", response.data.len()),
        ));
    }
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

fn into_text(provider: &str, response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| DocqaError::provider(provider, "API returned no completion choices"))
}

// ── ModelProvider implementation ───────────────────────────────────

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn completion_model(&self) -> &str {
        &self.completion_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = self.name, text_len = text.len(), "embedding single text");
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| DocqaError::provider(self.name, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = self.name,
            batch_size = texts.len(),
            model = %self.embedding_model,
            "embedding batch"
        );

        let body = EmbeddingRequest { model: &self.embedding_model, input: texts };
        let response = self
            .post("embeddings")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(self.name, e))?;

        let parsed: EmbeddingResponse = read_json(self.name, response, error_detail).await?;
        into_vectors(self.name, parsed, texts.len())
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(
            provider = self.name,
            model = %self.completion_model,
            prompt_len = request.prompt.len(),
            "completion"
        );

        request.ensure_text_only(self.name)?;
        let body = chat_request(&self.completion_model, request);
        let response = self
            .post("chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(self.name, e))?;

        let parsed: ChatResponse = read_json(self.name, response, error_detail).await?;
        into_text(self.name, parsed)
    }
}
