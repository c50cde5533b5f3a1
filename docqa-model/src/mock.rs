//! Offline provider for tests and demos.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa_core::{CompletionRequest, DocqaError, ModelProvider, Result};

enum Reply {
    Text(String),
    Error(DocqaError),
    Hang,
}

/// A deterministic [`ModelProvider`] that never touches the network.
///
/// Embeddings are derived from a hash of the text unless a fixed vector was
/// registered with [`with_embedding`](MockProvider::with_embedding).
/// Completions are served from a script of replies; once the script is empty
/// the default reply is returned.
///
/// # Example
///
/// ```rust
/// use docqa_model::MockProvider;
///
/// let provider = MockProvider::new(8)
///     .with_reply("Curry Palace")
///     .with_default_reply("answer is not available in the context");
/// ```
pub struct MockProvider {
    dimensions: usize,
    embedding_model: String,
    completion_model: String,
    fixed: HashMap<String, Vec<f32>>,
    script: Mutex<VecDeque<Reply>>,
    default_reply: String,
    prompts: Mutex<Vec<CompletionRequest>>,
    embed_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            embedding_model: "mock-embedding".into(),
            completion_model: "mock-completion".into(),
            fixed: HashMap::new(),
            script: Mutex::new(VecDeque::new()),
            default_reply: "mock reply".into(),
            prompts: Mutex::new(Vec::new()),
            embed_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_completion_model(mut self, model: impl Into<String>) -> Self {
        self.completion_model = model.into();
        self
    }

    /// Return `vector` whenever `text` is embedded.
    pub fn with_embedding(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.into(), vector);
        self
    }

    /// Queue a successful completion.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Reply::Text(text.into()));
        self
    }

    /// Queue a failed completion.
    pub fn with_error(self, error: DocqaError) -> Self {
        self.push(Reply::Error(error));
        self
    }

    /// Queue a completion that never finishes.
    pub fn with_hang(self) -> Self {
        self.push(Reply::Hang);
        self
    }

    pub fn with_default_reply(mut self, text: impl Into<String>) -> Self {
        self.default_reply = text.into();
        self
    }

    /// Every completion request received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of texts embedded so far.
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    fn push(&self, reply: Reply) {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).push_back(reply);
    }

    fn hash_embedding(&self, text: &str) -> Vec<f32> {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut emb: Vec<f32> = (0..self.dimensions)
            .map(|i| ((hash.wrapping_add(i as u64)) as f32).sin())
            .collect();
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        emb
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn completion_model(&self) -> &str {
        &self.completion_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fixed.get(text).cloned().unwrap_or_else(|| self.hash_embedding(text)))
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).push(request.clone());
        let reply = self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Error(e)) => Err(e),
            Some(Reply::Hang) => std::future::pending().await,
            None => Ok(self.default_reply.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embeddings_are_deterministic_and_normalized() {
        let provider = MockProvider::new(16);
        let a = provider.embed("rust ownership").await.unwrap();
        let b = provider.embed("rust ownership").await.unwrap();
        let c = provider.embed("python typing").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(provider.embed_calls(), 3);
    }

    #[tokio::test]
    async fn script_then_default() {
        let provider = MockProvider::new(4)
            .with_reply("first")
            .with_error(DocqaError::transient("Mock", "blip"))
            .with_default_reply("fallback");

        let req = CompletionRequest::new("q");
        assert_eq!(provider.complete(&req).await.unwrap(), "first");
        assert!(provider.complete(&req).await.is_err());
        assert_eq!(provider.complete(&req).await.unwrap(), "fallback");
        assert_eq!(provider.requests().len(), 3);
    }
}
