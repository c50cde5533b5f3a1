//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the two user-facing workflows:
//!
//! - **ingest**: chunk → embed → build index → persist
//! - **ask**: load index → embed question → retrieve → synthesize answer
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagConfig, RagPipeline, load_documents};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .provider(provider)
//!     .index_path("docqa_index.json")
//!     .build()?;
//!
//! pipeline.ingest(&load_documents(&paths).await?).await?;
//! let answer = pipeline.ask("What does chapter 2 say about lifetimes?").await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docqa_core::{DocqaError, ModelProvider, Result, RetryPolicy, retry};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Document, SearchResult};
use crate::index::VectorIndex;
use crate::retriever::Retriever;
use crate::synthesizer::{Answer, Synthesizer};

/// Where the index is written when no path is configured.
pub const DEFAULT_INDEX_PATH: &str = "docqa_index.json";

/// Summary of one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Documents that contributed chunks.
    pub documents: usize,
    /// Documents skipped because they had no text.
    pub skipped: usize,
    /// Chunks written to the index.
    pub chunks: usize,
    /// Embedding dimensionality.
    pub dimensions: usize,
    /// Where the index was written.
    pub index_path: PathBuf,
}

/// The RAG pipeline orchestrator. Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    provider: Arc<dyn ModelProvider>,
    chunker: Arc<dyn Chunker>,
    index_path: PathBuf,
    retry: RetryPolicy,
    retriever: Retriever,
    synthesizer: Synthesizer,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Rebuild the index from `documents` and persist it, replacing any
    /// previous index at the configured path.
    ///
    /// Documents without text are skipped with a warning.
    ///
    /// # Errors
    ///
    /// - [`DocqaError::Extraction`] if no document produced any chunk
    /// - provider errors from embedding, after retries
    /// - [`DocqaError::Storage`] if the index cannot be written
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport> {
        let mut all_chunks = Vec::new();
        let mut skipped = 0;
        for document in documents {
            if document.text.trim().is_empty() {
                warn!(document.id = %document.id, "skipping document with no extractable text");
                skipped += 1;
                continue;
            }
            let before = all_chunks.len();
            all_chunks.extend(self.chunker.chunks(document));
            debug!(
                document.id = %document.id,
                chunk_count = all_chunks.len() - before,
                "chunked document"
            );
        }

        if all_chunks.is_empty() {
            let source_id = match documents {
                [] => "<no documents>".to_string(),
                docs => docs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>().join(", "),
            };
            return Err(DocqaError::Extraction {
                source_id,
                message: "no extractable text in any document".into(),
            });
        }

        let batch_size = self.config.embed_batch_size.max(1);
        let mut vectors = Vec::with_capacity(all_chunks.len());
        for batch in all_chunks.chunks(batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embedded = retry(&self.retry, "embed chunks", || self.provider.embed_batch(&texts))
                .await
                .inspect_err(|e| error!(error = %e, "embedding failed during ingestion"))?;
            if embedded.len() != batch.len() {
                return Err(DocqaError::provider(
                    self.provider.name(),
                    format!("returned {} embeddings for {} chunks", embedded.len(), batch.len()),
                ));
            }
            vectors.extend(embedded);
        }

        let chunk_count = all_chunks.len();
        let index = VectorIndex::build(
            self.provider.embedding_model(),
            self.config.metric,
            all_chunks.into_iter().zip(vectors),
        )?;
        let dimensions = index.dimensions();

        let path = self.index_path.clone();
        tokio::task::spawn_blocking(move || index.persist(&path))
            .await
            .map_err(|e| DocqaError::Storage(format!("persist task failed: {e}")))??;

        let report = IngestReport {
            documents: documents.len() - skipped,
            skipped,
            chunks: chunk_count,
            dimensions,
            index_path: self.index_path.clone(),
        };
        info!(
            documents = report.documents,
            skipped = report.skipped,
            chunk_count = report.chunks,
            dimensions = report.dimensions,
            path = %self.index_path.display(),
            "ingested documents"
        );
        Ok(report)
    }

    /// Load the persisted index.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::NotFound`] telling the user to run ingestion if
    /// no index exists yet.
    pub async fn load_index(&self) -> Result<VectorIndex> {
        let path = self.index_path.clone();
        tokio::task::spawn_blocking(move || VectorIndex::load(&path))
            .await
            .map_err(|e| DocqaError::Storage(format!("load task failed: {e}")))?
            .map_err(|e| match e {
                DocqaError::NotFound(_) => DocqaError::NotFound(format!(
                    "no index at {}; run ingest first",
                    self.index_path.display()
                )),
                other => other,
            })
    }

    /// Retrieve the top-k chunks for `question` from the persisted index.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        let index = self.load_index().await?;
        self.retrieve_from(&index, question).await
    }

    /// Retrieve from an already loaded index.
    pub async fn retrieve_from(
        &self,
        index: &VectorIndex,
        question: &str,
    ) -> Result<Vec<SearchResult>> {
        self.retriever.retrieve(index, question, self.config.top_k).await
    }

    /// Answer `question` from the persisted index.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let index = self.load_index().await?;
        self.ask_with(&index, question).await
    }

    /// Answer from an already loaded index, as the chat loop does.
    pub async fn ask_with(&self, index: &VectorIndex, question: &str) -> Result<Answer> {
        let sources = self.retrieve_from(index, question).await?;
        self.synthesizer.synthesize(question, &sources).await.inspect_err(|e| {
            error!(error = %e, "answer synthesis failed");
        })
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// Only the provider is required. The chunker defaults to a
/// [`RecursiveChunker`] sized from the config, and the index path to
/// [`DEFAULT_INDEX_PATH`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    provider: Option<Arc<dyn ModelProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
    index_path: Option<PathBuf>,
    template: Option<String>,
    retry: Option<RetryPolicy>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the provider used for both embeddings and answers.
    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Use a custom answer template with `{context}` and `{question}`.
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] if the provider is missing, the
    /// chunk sizes are inconsistent or the template is unusable.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let provider = self
            .provider
            .ok_or_else(|| DocqaError::Configuration("provider is required".to_string()))?;
        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };
        let retry = self.retry.unwrap_or_default();

        let mut synthesizer = Synthesizer::new(provider.clone())?
            .with_temperature(Some(config.temperature))
            .with_retry_policy(retry.clone());
        if let Some(template) = &self.template {
            synthesizer = synthesizer.with_template(template)?;
        }
        let retriever = Retriever::new(provider.clone()).with_retry_policy(retry.clone());

        Ok(RagPipeline {
            config,
            provider,
            chunker,
            index_path: self.index_path.unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_PATH)),
            retry,
            retriever,
            synthesizer,
        })
    }
}
