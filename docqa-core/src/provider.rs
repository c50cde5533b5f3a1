//! Provider capability trait for embedding and completion backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DocqaError, Result};

/// An image sent inline with a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePart {
    /// IANA media type, such as `image/png`.
    pub mime_type: String,
    /// Raw image bytes; providers encode them as their wire format needs.
    pub data: Vec<u8>,
}

impl ImagePart {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self { mime_type: mime_type.into(), data }
    }

    /// The media type for an image file extension, matched case-insensitively.
    pub fn mime_type_for_extension(extension: &str) -> Option<&'static str> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "webp" => Some("image/webp"),
            "heic" => Some("image/heic"),
            "heif" => Some("image/heif"),
            _ => None,
        }
    }
}

/// A single completion call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The user prompt, already rendered.
    pub prompt: String,
    /// Optional system instruction sent ahead of the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Sampling temperature. `None` leaves the provider default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Images placed after the prompt text, for providers that accept them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImagePart>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Default::default() }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_image(mut self, image: ImagePart) -> Self {
        self.images.push(image);
        self
    }

    /// Fail with [`DocqaError::Configuration`] if the request carries images.
    ///
    /// Text-only providers call this before sending anything.
    pub fn ensure_text_only(&self, provider: &str) -> Result<()> {
        if self.images.is_empty() {
            Ok(())
        } else {
            Err(DocqaError::Configuration(format!(
                "{provider} does not accept images; use the gemini provider"
            )))
        }
    }
}

/// A backend that can embed text and complete prompts.
///
/// Implementations wrap a specific provider (OpenAI, Gemini, Hugging Face,
/// a local server) behind one async interface so that pipeline code never
/// touches a provider's wire format. The embedding model and the completion
/// model are configured independently.
///
/// Implementations make exactly one attempt per call; retrying is the
/// caller's job (see [`crate::retry`]).
///
/// # Example
///
/// ```rust,ignore
/// use docqa_core::{CompletionRequest, ModelProvider};
///
/// let vector = provider.embed("hello world").await?;
/// let text = provider.complete(&CompletionRequest::new("Say hi")).await?;
/// ```
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name used in logs and error messages (e.g. `OpenAI`).
    fn name(&self) -> &str;

    /// Identifier of the model used by [`embed`](ModelProvider::embed).
    fn embedding_model(&self) -> &str;

    /// Identifier of the model used by [`complete`](ModelProvider::complete).
    fn completion_model(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](ModelProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Run a completion and return the generated text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn image_extensions() {
        assert_eq!(ImagePart::mime_type_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(ImagePart::mime_type_for_extension("png"), Some("image/png"));
        assert_eq!(ImagePart::mime_type_for_extension("bmp"), None);
    }

    #[test]
    fn text_only_providers_refuse_images() {
        let request = CompletionRequest::new("What is in this picture?");
        assert!(request.ensure_text_only("OpenAI").is_ok());

        let request = request.with_image(ImagePart::new("image/png", vec![1, 2, 3]));
        let err = request.ensure_text_only("OpenAI").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("OpenAI"));
    }
}
