use std::time::Duration;

use docqa_core::{ErrorKind, ModelProvider};
use docqa_model::{ProviderConfig, ProviderKind, create_provider};

#[test]
fn creates_each_provider_kind() {
    let cases = [
        (ProviderKind::OpenAi, "OpenAI", "gpt-4o-mini"),
        (ProviderKind::Gemini, "Gemini", "gemini-2.0-flash"),
        (ProviderKind::HuggingFace, "HuggingFace", "tiiuae/falcon-7b-instruct"),
        (ProviderKind::Local, "Local", "local-model"),
    ];
    for (kind, name, completion_model) in cases {
        let config = ProviderConfig::new(kind).with_api_key("test-key");
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), name);
        assert_eq!(provider.completion_model(), completion_model);
    }
}

#[test]
fn embedding_and_completion_models_are_independent() {
    let config = ProviderConfig::new(ProviderKind::OpenAi)
        .with_api_key("test-key")
        .with_embedding_model("text-embedding-3-large")
        .with_completion_model("gpt-4")
        .with_timeout(Duration::from_secs(5));
    let provider = create_provider(&config).unwrap();
    assert_eq!(provider.embedding_model(), "text-embedding-3-large");
    assert_eq!(provider.completion_model(), "gpt-4");
}

#[test]
fn missing_credentials_fail_before_any_request() {
    for kind in [ProviderKind::OpenAi, ProviderKind::Gemini, ProviderKind::HuggingFace] {
        let err = create_provider(&ProviderConfig::new(kind).with_api_key("   ")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration, "{kind}");
    }
}

#[tokio::test]
async fn unreachable_local_server_is_transient() {
    // Nothing listens on the discard port.
    let config = ProviderConfig::new(ProviderKind::Local)
        .with_base_url("http://127.0.0.1:9/v1")
        .with_timeout(Duration::from_secs(2));
    let provider = create_provider(&config).unwrap();
    let err = provider.embed("hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
}
