//! Hugging Face Hub provider using the hosted Inference API.
//!
//! Completions go through the `text-generation` task, embeddings through the
//! `feature-extraction` pipeline. A model that is still loading answers 503,
//! which maps to a transient error and is retried by the caller.

use async_trait::async_trait;
use docqa_core::{CompletionRequest, DocqaError, ModelProvider, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::http::{build_client, classify_transport, read_json};

const PROVIDER: &str = "HuggingFace";

/// A [`ModelProvider`] backed by the Hugging Face Inference API.
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    embedding_model: String,
    completion_model: String,
}

impl HuggingFaceProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?.ok_or_else(|| {
            DocqaError::Configuration(
                "Hugging Face requires an API token (HUGGINGFACEHUB_API_TOKEN)".into(),
            )
        })?;
        Ok(Self {
            client: build_client(PROVIDER, config.timeout)?,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key,
            embedding_model: config.embedding_model().to_string(),
            completion_model: config.completion_model().to_string(),
        })
    }
}

#[derive(Serialize)]
struct GenerationRequest {
    inputs: String,
    parameters: GenerationParameters,
    options: Options,
}

#[derive(Serialize)]
struct GenerationParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_new_tokens: Option<u32>,
    return_full_text: bool,
}

#[derive(Serialize)]
struct Options {
    wait_for_model: bool,
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [&'a str],
    options: Options,
}

#[derive(Deserialize)]
struct Generated {
    generated_text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Many(Vec<Generated>),
    One(Generated),
}

/// Sentence-level models return one vector per input; token-level models
/// return one vector per token, which are mean-pooled here.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureResponse {
    Sentences(Vec<Vec<f32>>),
    Tokens(Vec<Vec<Vec<f32>>>),
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body).ok().map(|e| e.error)
}

fn generation_request(request: &CompletionRequest) -> GenerationRequest {
    let inputs = match &request.system {
        Some(system) => format!("{system}\n\n{}", request.prompt),
        None => request.prompt.clone(),
    };
    GenerationRequest {
        inputs,
        parameters: GenerationParameters {
            temperature: request.temperature,
            max_new_tokens: request.max_tokens,
            return_full_text: false,
        },
        options: Options { wait_for_model: false },
    }
}

fn mean_pool(tokens: Vec<Vec<f32>>) -> Vec<f32> {
    let Some(width) = tokens.first().map(Vec::len) else {
        return Vec::new();
    };
    let mut pooled = vec![0.0f32; width];
    for token in &tokens {
        for (acc, v) in pooled.iter_mut().zip(token) {
            *acc += v;
        }
    }
    let count = tokens.len() as f32;
    pooled.iter_mut().for_each(|v| *v /= count);
    pooled
}

fn into_vectors(response: FeatureResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    let vectors: Vec<Vec<f32>> = match response {
        FeatureResponse::Sentences(v) => v,
        FeatureResponse::Tokens(t) => t.into_iter().map(mean_pool).collect(),
    };
    if vectors.len() != expected {
        return Err(DocqaError::provider(
            PROVIDER,
            format!("API returned {} embeddings for {expected} inputs", vectors.len()),
        ));
    }
    Ok(vectors)
}

fn into_text(response: GenerationResponse) -> Result<String> {
    match response {
        GenerationResponse::One(g) => Ok(g.generated_text),
        GenerationResponse::Many(many) => many
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or_else(|| DocqaError::provider(PROVIDER, "API returned no generations")),
    }
}

#[async_trait]
impl ModelProvider for HuggingFaceProvider {
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
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| DocqaError::provider(PROVIDER, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), "embedding batch");

        let body =
            FeatureExtractionRequest { inputs: texts, options: Options { wait_for_model: false } };
        let response = self
            .client
            .post(format!("{}/pipeline/feature-extraction/{}", self.base_url, self.embedding_model))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, e))?;

        let parsed: FeatureResponse = read_json(PROVIDER, response, error_detail).await?;
        into_vectors(parsed, texts.len())
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.completion_model, "completion");

        request.ensure_text_only(PROVIDER)?;
        let body = generation_request(request);
        let response = self
            .client
            .post(format!("{}/models/{}", self.base_url, self.completion_model))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, e))?;

        let parsed: GenerationResponse = read_json(PROVIDER, response, error_detail).await?;
        into_text(parsed)
    }
}
