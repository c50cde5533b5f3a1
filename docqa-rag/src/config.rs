//! Configuration for the RAG pipeline.

use docqa_core::{DocqaError, Result};
use serde::{Deserialize, Serialize};

use crate::index::Metric;
use crate::synthesizer::DEFAULT_TEMPERATURE;

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks placed in the answer prompt.
    pub top_k: usize,
    /// Similarity metric for newly built indexes.
    pub metric: Metric,
    /// Number of chunks sent to the embedding model per request.
    pub embed_batch_size: usize,
    /// Sampling temperature for answers.
    pub temperature: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            chunk_overlap: 1_000,
            top_k: 4,
            metric: Metric::Cosine,
            embed_batch_size: 32,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.config.metric = metric;
        self
    }

    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embed_batch_size == 0`
    /// - `temperature` is negative or not finite
    pub fn build(self) -> Result<RagConfig> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(DocqaError::Configuration("chunk_size must be greater than zero".into()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(DocqaError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.top_k == 0 {
            return Err(DocqaError::Configuration("top_k must be greater than zero".into()));
        }
        if c.embed_batch_size == 0 {
            return Err(DocqaError::Configuration(
                "embed_batch_size must be greater than zero".into(),
            ));
        }
        if !c.temperature.is_finite() || c.temperature < 0.0 {
            return Err(DocqaError::Configuration(format!(
                "temperature must be a non-negative number, got {}",
                c.temperature
            )));
        }
        Ok(self.config)
    }
}
