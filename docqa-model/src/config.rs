//! Provider selection and credentials.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use docqa_core::{DocqaError, ModelProvider, Result};
use serde::{Deserialize, Serialize};

use crate::gemini::GeminiProvider;
use crate::huggingface::HuggingFaceProvider;
use crate::openai::OpenAIProvider;

/// Default per-request timeout for hosted providers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The backend family to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Gemini,
    HuggingFace,
    /// An OpenAI-compatible server on the local machine (llama.cpp server, Ollama).
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Local => "local",
        }
    }

    /// Environment variable holding the API key, if the provider needs one.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Gemini => Some("GOOGLE_API_KEY"),
            ProviderKind::HuggingFace => Some("HUGGINGFACEHUB_API_TOKEN"),
            ProviderKind::Local => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::HuggingFace => "https://api-inference.huggingface.co",
            ProviderKind::Local => "http://localhost:8080/v1",
        }
    }

    pub fn default_embedding_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "text-embedding-3-small",
            ProviderKind::Gemini => "text-embedding-004",
            ProviderKind::HuggingFace => "sentence-transformers/all-MiniLM-L6-v2",
            ProviderKind::Local => "local-embedding",
        }
    }

    pub fn default_completion_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::HuggingFace => "tiiuae/falcon-7b-instruct",
            ProviderKind::Local => "local-model",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DocqaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "huggingface" | "hf" => Ok(ProviderKind::HuggingFace),
            "local" | "llamacpp" | "llama.cpp" | "ollama" => Ok(ProviderKind::Local),
            other => Err(DocqaError::Configuration(format!(
                "unknown provider '{other}' (expected openai, gemini, huggingface or local)"
            ))),
        }
    }
}

/// Everything needed to construct a [`ModelProvider`].
///
/// Unset fields fall back to the defaults of the chosen [`ProviderKind`].
/// The API key is the explicit value if set, otherwise the key file.
/// [`from_env`](Self::from_env) fills the explicit value from the
/// provider's own variable, such as `OPENAI_API_KEY`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub api_key_file: Option<PathBuf>,
    pub base_url: Option<String>,
    pub embedding_model: Option<String>,
    pub completion_model: Option<String>,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            api_key_file: None,
            base_url: None,
            embedding_model: None,
            completion_model: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Read `DOCQA_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = match lookup("DOCQA_PROVIDER") {
            Some(value) => value.parse()?,
            None => ProviderKind::default(),
        };
        let mut config = Self::new(kind);
        config.base_url = lookup("DOCQA_BASE_URL");
        config.embedding_model = lookup("DOCQA_EMBEDDING_MODEL");
        config.completion_model = lookup("DOCQA_COMPLETION_MODEL");
        config.api_key_file = lookup("DOCQA_API_KEY_FILE").map(PathBuf::from);
        config.api_key = kind.api_key_var().and_then(&lookup);
        if let Some(secs) = lookup("DOCQA_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                DocqaError::Configuration(format!("DOCQA_TIMEOUT_SECS is not a number: '{secs}'"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.api_key_file = Some(path.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_completion_model(mut self, model: impl Into<String>) -> Self {
        self.completion_model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(self.kind.default_base_url())
    }

    pub fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or(self.kind.default_embedding_model())
    }

    pub fn completion_model(&self) -> &str {
        self.completion_model.as_deref().unwrap_or(self.kind.default_completion_model())
    }

    /// Resolve the API key.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] if the key file cannot be read,
    /// or if a hosted provider ends up without a non-empty key.
    pub fn resolve_api_key(&self) -> Result<Option<String>> {
        let key = if let Some(key) = &self.api_key {
            Some(key.trim().to_string())
        } else if let Some(path) = &self.api_key_file {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                DocqaError::Configuration(format!(
                    "failed to read API key file '{}': {e}",
                    path.display()
                ))
            })?;
            Some(contents.trim().to_string())
        } else {
            None
        };
        let key = key.filter(|k| !k.is_empty());

        match (self.kind.api_key_var(), key) {
            (Some(var), None) => Err(DocqaError::Configuration(format!(
                "no API key for {}: set {var} or provide an API key file",
                self.kind
            ))),
            (_, key) => Ok(key),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new(ProviderKind::default())
    }
}

/// Construct the provider described by `config`.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn ModelProvider>> {
    let provider: Arc<dyn ModelProvider> = match config.kind {
        ProviderKind::OpenAi | ProviderKind::Local => Arc::new(OpenAIProvider::from_config(config)?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(config)?),
        ProviderKind::HuggingFace => Arc::new(HuggingFaceProvider::from_config(config)?),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use docqa_core::ErrorKind;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_provider_aliases() {
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("hf".parse::<ProviderKind>().unwrap(), ProviderKind::HuggingFace);
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        let err = "palm".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn env_selects_provider_and_models() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("DOCQA_PROVIDER", "gemini"),
            ("GOOGLE_API_KEY", "g-key"),
            ("OPENAI_API_KEY", "ignored"),
            ("DOCQA_COMPLETION_MODEL", "gemini-1.5-pro"),
            ("DOCQA_TIMEOUT_SECS", "15"),
        ]))
        .unwrap();

        assert_eq!(config.kind, ProviderKind::Gemini);
        assert_eq!(config.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.completion_model(), "gemini-1.5-pro");
        assert_eq!(config.embedding_model(), "text-embedding-004");
        assert_eq!(config.timeout, Duration::from_secs(15));
    }

    #[test]
    fn hosted_provider_without_key_is_configuration_error() {
        let config = ProviderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.kind, ProviderKind::OpenAi);
        let err = config.resolve_api_key().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn local_provider_needs_no_key() {
        let config = ProviderConfig::new(ProviderKind::Local);
        assert_eq!(config.resolve_api_key().unwrap(), None);
        assert_eq!(config.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn key_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openai.key");
        std::fs::write(&path, "  sk-test\n").unwrap();
        let config = ProviderConfig::new(ProviderKind::OpenAi).with_api_key_file(&path);
        assert_eq!(config.resolve_api_key().unwrap().as_deref(), Some("sk-test"));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = ProviderConfig::from_lookup(lookup(&[("DOCQA_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
