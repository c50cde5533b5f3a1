//! Gemini provider using the Generative Language REST API.
//!
//! This is the one provider that accepts images: each [`ImagePart`] of a
//! request becomes an `inlineData` part after the prompt text.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use docqa_core::{CompletionRequest, DocqaError, ImagePart, ModelProvider, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::http::{build_client, classify_transport, read_json};

const PROVIDER: &str = "Gemini";

/// A [`ModelProvider`] backed by the Gemini API.
///
/// Model names may be given with or without the `models/` prefix.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_model::{GeminiProvider, ProviderConfig, ProviderKind};
///
/// let provider = GeminiProvider::from_config(
///     &ProviderConfig::new(ProviderKind::Gemini).with_api_key("your-api-key"),
/// )?;
/// let answer = provider.complete(&CompletionRequest::new("Who are you?")).await?;
/// ```
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    embedding_model: String,
    completion_model: String,
}

impl GeminiProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?.ok_or_else(|| {
            DocqaError::Configuration("Gemini requires an API key (GOOGLE_API_KEY)".into())
        })?;
        Ok(Self {
            client: build_client(PROVIDER, config.timeout)?,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key,
            embedding_model: bare_model(config.embedding_model()).to_string(),
            completion_model: bare_model(config.completion_model()).to_string(),
        })
    }

    fn post(&self, model: &str, method: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/models/{model}:{method}", self.base_url))
            .header("x-goog-api-key", &self.api_key)
    }
}

fn bare_model(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<PartRef<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum PartRef<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

impl<'a> PartRef<'a> {
    fn image(image: &'a ImagePart) -> Self {
        PartRef::InlineData {
            inline_data: InlineData { mime_type: &image.mime_type, data: STANDARD.encode(&image.data) },
        }
    }
}

impl<'a> Content<'a> {
    fn text(role: Option<&'static str>, text: &'a str) -> Self {
        Self { role, parts: vec![PartRef::Text { text }] }
    }
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
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

fn generate_request(request: &CompletionRequest) -> GenerateRequest<'_> {
    let generation_config = (request.temperature.is_some() || request.max_tokens.is_some())
        .then_some(GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        });
    // An image on its own is a valid question; an empty text part is not.
    let mut parts = Vec::with_capacity(1 + request.images.len());
    if !request.prompt.is_empty() || request.images.is_empty() {
        parts.push(PartRef::Text { text: &request.prompt });
    }
    parts.extend(request.images.iter().map(PartRef::image));

    GenerateRequest {
        contents: [Content { role: Some("user"), parts }],
        system_instruction: request.system.as_deref().map(|s| Content::text(None, s)),
        generation_config,
    }
}

fn into_text(response: GenerateResponse) -> Result<String> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        DocqaError::provider(PROVIDER, "API returned no candidates (prompt blocked?)")
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(DocqaError::provider(
            PROVIDER,
            format!("candidate has no text (finish reason: {reason})"),
        ));
    }
    Ok(text)
}

// ── ModelProvider implementation ───────────────────────────────────

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn completion_model(&self) -> &str {
        &self.completion_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let body = EmbedContentRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content::text(None, text),
        };
        let response = self
            .post(&self.embedding_model, "embedContent")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, e))?;

        let parsed: EmbedContentResponse = read_json(PROVIDER, response, error_detail).await?;
        Ok(parsed.embedding.values)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), "embedding batch");

        let model = format!("models/{}", self.embedding_model);
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|t| EmbedContentRequest {
                    model: model.clone(),
                    content: Content::text(None, t),
                })
                .collect(),
        };
        let response = self
            .post(&self.embedding_model, "batchEmbedContents")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, e))?;

        let parsed: BatchEmbedResponse = read_json(PROVIDER, response, error_detail).await?;
        if parsed.embeddings.len() != texts.len() {
            return Err(DocqaError::provider(
                PROVIDER,
                format!(
                    "API returned {} embeddings for {} inputs",
                    parsed.embeddings.len(),
                    texts.len()
                ),
            ));
        }
        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.completion_model,
            prompt_len = request.prompt.len(),
            images = request.images.len(),
            "completion"
        );

        let body = generate_request(request);
        let response = self
            .post(&self.completion_model, "generateContent")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, e))?;

        let parsed: GenerateResponse = read_json(PROVIDER, response, error_detail).await?;
        into_text(parsed)
    }
}
