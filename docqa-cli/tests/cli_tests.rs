use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use docqa_cli::{Cli, execute, render_error};
use docqa_core::{DocqaError, ModelProvider, RetryPolicy};
use docqa_model::MockProvider;

fn cli(index: &Path, args: &[&str]) -> Cli {
    let index = index.display().to_string();
    let mut argv = vec!["docqa", "--index", index.as_str(), "--chunk-size", "200", "--chunk-overlap", "20"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

async fn run(cli: &Cli, provider: Arc<dyn ModelProvider>) -> anyhow::Result<String> {
    let mut out = Vec::new();
    execute(cli, provider, RetryPolicy::no_retry(), &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn ingest_then_ask_with_sources() {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir(&docs).unwrap();
    std::fs::write(docs.join("ownership.md"), "Each value in Rust has a single owner.").unwrap();
    std::fs::write(docs.join("empty.txt"), "   ").unwrap();
    let index = dir.path().join("index.json");

    let provider = Arc::new(MockProvider::new(16).with_default_reply("Every value has one owner."));
    let docs_arg = docs.display().to_string();
    let out = run(&cli(&index, &["ingest", docs_arg.as_str()]), provider.clone()).await.unwrap();
    assert!(out.starts_with("Indexed 1 chunks from 1 document(s)"), "{out}");
    assert!(out.contains("Skipped 1 document(s)"));
    assert!(index.exists());

    let out = run(&cli(&index, &["ask", "Who owns a value?", "--sources"]), provider).await.unwrap();
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("Every value has one owner."));
    assert!(out.contains("Sources:"));
    assert!(out.contains("ownership.md chunk 0"));
}

#[tokio::test]
async fn ask_flags_answers_outside_the_documents() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("notes.txt");
    std::fs::write(&file, "Borrowing lets code use a value without owning it.").unwrap();
    let index = dir.path().join("index.json");
    let provider = Arc::new(
        MockProvider::new(8).with_default_reply("The answer is not available in the context."),
    );

    let file_arg = file.display().to_string();
    run(&cli(&index, &["ingest", file_arg.as_str()]), provider.clone()).await.unwrap();
    let out = run(&cli(&index, &["ask", "What is the capital of France?"]), provider).await.unwrap();
    assert!(out.contains("do not answer this question"), "{out}");
}

#[tokio::test]
async fn ask_before_ingest_tells_the_user_what_to_do() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("missing.json");
    let err = run(&cli(&index, &["ask", "anything"]), Arc::new(MockProvider::new(4)))
        .await
        .unwrap_err();
    let rendered = render_error(&err);
    assert!(rendered.starts_with("error [not_found]:"), "{rendered}");
    assert!(rendered.contains("run ingest first"));
}

#[tokio::test]
async fn restaurant_prints_a_numbered_menu() {
    let provider = Arc::new(
        MockProvider::new(4)
            .with_reply("  Saffron Court\n")
            .with_reply("[(Butter Chicken, $18), (Garlic Naan, $4)]"),
    );
    let dir = tempfile::tempdir().unwrap();
    let out = run(&cli(&dir.path().join("i.json"), &["restaurant", "Indian"]), provider.clone())
        .await
        .unwrap();
    assert_eq!(out, "Saffron Court\n\n  1. Butter Chicken ($18)\n  2. Garlic Naan ($4)\n");

    let prompts = provider.requests();
    assert!(prompts[0].prompt.contains("Indian"));
    assert!(prompts[1].prompt.contains("Saffron Court"));
}

#[tokio::test]
async fn restaurant_falls_back_to_the_raw_menu() {
    let provider = Arc::new(
        MockProvider::new(4).with_reply("Casa Verde").with_reply("Tacos and more tacos"),
    );
    let dir = tempfile::tempdir().unwrap();
    let out = run(&cli(&dir.path().join("i.json"), &["restaurant", "Mexican"]), provider)
        .await
        .unwrap();
    assert_eq!(out, "Casa Verde\n\nTacos and more tacos\n");
}

#[tokio::test]
async fn complete_passes_system_and_limits() {
    let provider = Arc::new(MockProvider::new(4).with_reply("Borrowing is lending a reference.\n"));
    let dir = tempfile::tempdir().unwrap();
    let args = [
        "--temperature",
        "0.2",
        "complete",
        "Explain borrowing",
        "--system",
        "Be brief",
        "--max-tokens",
        "40",
    ];
    let out = run(&cli(&dir.path().join("i.json"), &args), provider.clone()).await.unwrap();
    assert_eq!(out, "Borrowing is lending a reference.\n");

    let requests = provider.requests();
    let request = &requests[0];
    assert_eq!(request.system.as_deref(), Some("Be brief"));
    assert_eq!(request.max_tokens, Some(40));
    assert_eq!(request.temperature, Some(0.2));
}

#[tokio::test]
async fn provider_failures_keep_their_category() {
    let provider = Arc::new(
        MockProvider::new(4).with_error(DocqaError::Authentication {
            provider: "Mock".into(),
            message: "invalid key".into(),
        }),
    );
    let dir = tempfile::tempdir().unwrap();
    let err = run(&cli(&dir.path().join("i.json"), &["complete", "hi"]), provider)
        .await
        .unwrap_err();
    assert!(render_error(&err).starts_with("error [authentication]:"));
}

#[tokio::test]
async fn generate_fills_every_placeholder() {
    let provider = Arc::new(MockProvider::new(4).with_reply("Vector search, explained.\n"));
    let dir = tempfile::tempdir().unwrap();
    let args = [
        "generate",
        "--template",
        "Write a blog for {target_audience} job profile for a topic {blog_topic} within {num_words} words.",
        "--var",
        "target_audience=Researchers",
        "--var",
        "blog_topic=vector search",
        "--var",
        "num_words=300",
    ];
    let out = run(&cli(&dir.path().join("i.json"), &args), provider.clone()).await.unwrap();
    assert_eq!(out, "Vector search, explained.\n");

    let requests = provider.requests();
    assert_eq!(
        requests[0].prompt,
        "Write a blog for Researchers job profile for a topic vector search within 300 words."
    );
}

#[tokio::test]
async fn generate_reads_the_template_from_a_file() {
    let provider = Arc::new(MockProvider::new(4).with_reply("Ada Lovelace wrote the first program."));
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("about.txt");
    std::fs::write(&template, "Tell me about {name}").unwrap();

    let template_arg = template.display().to_string();
    let args = ["generate", "--template-file", template_arg.as_str(), "--var", "name=Ada Lovelace"];
    run(&cli(&dir.path().join("i.json"), &args), provider.clone()).await.unwrap();
    assert_eq!(provider.requests()[0].prompt, "Tell me about Ada Lovelace");
}

#[tokio::test]
async fn generate_with_a_missing_value_is_a_configuration_error() {
    let provider = Arc::new(MockProvider::new(4));
    let dir = tempfile::tempdir().unwrap();
    let args = ["generate", "--template", "Tell me about {name}", "--var", "other=x"];
    let err = run(&cli(&dir.path().join("i.json"), &args), provider.clone()).await.unwrap_err();

    let rendered = render_error(&err);
    assert!(rendered.starts_with("error [configuration]:"), "{rendered}");
    assert!(rendered.contains("name"));
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn complete_attaches_an_image() {
    let provider = Arc::new(MockProvider::new(4).with_reply("A cat on a keyboard."));
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("cat.PNG");
    std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();

    let image_arg = image.display().to_string();
    let args = ["complete", "What is this?", "--image", image_arg.as_str()];
    let out = run(&cli(&dir.path().join("i.json"), &args), provider.clone()).await.unwrap();
    assert_eq!(out, "A cat on a keyboard.\n");

    let requests = provider.requests();
    assert_eq!(requests[0].prompt, "What is this?");
    assert_eq!(requests[0].images.len(), 1);
    assert_eq!(requests[0].images[0].mime_type, "image/png");
    assert_eq!(requests[0].images[0].data, [0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn complete_rejects_unknown_image_types() {
    let provider = Arc::new(MockProvider::new(4));
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("scan.bmp");
    std::fs::write(&image, b"BM").unwrap();

    let image_arg = image.display().to_string();
    let err = run(&cli(&dir.path().join("i.json"), &["complete", "--image", image_arg.as_str()]), provider.clone())
        .await
        .unwrap_err();
    assert!(render_error(&err).starts_with("error [configuration]:"));
    assert!(provider.requests().is_empty());
}
