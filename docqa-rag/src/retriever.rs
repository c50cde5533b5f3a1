//! Query-time lookup: embed the question, then search the index.

use std::sync::Arc;

use docqa_core::{ModelProvider, Result, RetryPolicy, retry};
use tracing::debug;

use crate::document::SearchResult;
use crate::index::VectorIndex;

/// Embeds questions with the same model that built the index and returns
/// the nearest chunks.
pub struct Retriever {
    provider: Arc<dyn ModelProvider>,
    retry: RetryPolicy,
}

impl Retriever {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider, retry: RetryPolicy::default() }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Return up to `k` chunks of `index` ranked by similarity to `question`.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::ModelMismatch`](docqa_core::DocqaError::ModelMismatch)
    /// before any request is made if the provider's embedding model is not
    /// the one recorded in the index. Provider errors surface after retries.
    pub async fn retrieve(
        &self,
        index: &VectorIndex,
        question: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        index.ensure_model(self.provider.embedding_model())?;

        let vector = retry(&self.retry, "embed query", || self.provider.embed(question)).await?;
        let results = index.query(&vector, k)?;

        debug!(
            k,
            result_count = results.len(),
            top_score = results.first().map(|r| r.score),
            "retrieved context"
        );
        Ok(results)
    }
}
