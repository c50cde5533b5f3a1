//! # docqa-core
//!
//! Shared building blocks for the docqa crates:
//!
//! - [`DocqaError`] / [`ErrorKind`]: the error taxonomy every component reports in
//! - [`ModelProvider`]: the embed/complete capability implemented per provider
//! - [`RetryPolicy`] / [`retry`]: bounded exponential backoff with per-attempt timeouts
//! - [`PromptTemplate`]: `{name}` placeholder templates

pub mod error;
pub mod prompt;
pub mod provider;
pub mod retry;

pub use error::{DocqaError, ErrorKind, Result};
pub use prompt::PromptTemplate;
pub use provider::{CompletionRequest, ImagePart, ModelProvider};
pub use retry::{RetryPolicy, retry};
