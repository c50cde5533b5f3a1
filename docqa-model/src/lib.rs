//! # docqa-model
//!
//! Concrete [`ModelProvider`](docqa_core::ModelProvider) backends.
//!
//! | Provider | Kind | Credentials |
//! |----------|------|-------------|
//! | [`OpenAIProvider`] | `openai` | `OPENAI_API_KEY` |
//! | [`OpenAIProvider`] | `local` (llama.cpp server, Ollama `/v1`) | none |
//! | [`GeminiProvider`] | `gemini` | `GOOGLE_API_KEY` |
//! | [`HuggingFaceProvider`] | `huggingface` | `HUGGINGFACEHUB_API_TOKEN` |
//! | [`MockProvider`] | tests only | none |
//!
//! Pick one at runtime with [`create_provider`]:
//!
//! ```rust,no_run
//! use docqa_core::ModelProvider;
//! use docqa_model::{ProviderConfig, create_provider};
//!
//! let config = ProviderConfig::from_env().unwrap();
//! let provider = create_provider(&config).unwrap();
//! println!("{} / {}", provider.embedding_model(), provider.completion_model());
//! ```
//!
//! Every HTTP client carries a request timeout. Status codes are mapped onto
//! the shared taxonomy: 401/403 authentication, 429 quota (with the
//! `Retry-After` hint), 408 and 5xx transient, anything else a provider error.

pub mod config;
pub mod gemini;
mod http;
pub mod huggingface;
pub mod mock;
pub mod openai;

pub use config::{DEFAULT_TIMEOUT, ProviderConfig, ProviderKind, create_provider};
pub use gemini::GeminiProvider;
pub use huggingface::HuggingFaceProvider;
pub use mock::MockProvider;
pub use openai::OpenAIProvider;
