//! Subcommand implementations.
//!
//! Everything here writes to a caller-supplied writer so the commands can be
//! driven from tests with a [`MockProvider`](docqa_model::MockProvider).

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use docqa_chain::{GENERATED_TEXT, LlmStage, parse_menu, restaurant_chain, template_chain};
use docqa_core::{CompletionRequest, DocqaError, ImagePart, ModelProvider, RetryPolicy, retry};
use docqa_model::{ProviderConfig, create_provider};
use docqa_rag::{Answer, RagConfig, RagPipeline, VectorIndex, load_documents};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use crate::cli::{Cli, Command};

/// Build the provider configuration: flags first, then `DOCQA_*` variables
/// from `env`, then the provider defaults.
///
/// An `--api-key-file` flag beats a key found in the environment.
pub fn provider_config<F>(cli: &Cli, env: F) -> docqa_core::Result<ProviderConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let provider = cli.provider.map(|kind| kind.as_str().to_string());
    let timeout = cli.timeout_secs.map(|secs| secs.to_string());

    let mut config = ProviderConfig::from_lookup(|key| {
        let flag = match key {
            "DOCQA_PROVIDER" => provider.clone(),
            "DOCQA_BASE_URL" => cli.base_url.clone(),
            "DOCQA_EMBEDDING_MODEL" => cli.embedding_model.clone(),
            "DOCQA_COMPLETION_MODEL" => cli.completion_model.clone(),
            "DOCQA_TIMEOUT_SECS" => timeout.clone(),
            _ => None,
        };
        flag.or_else(|| env(key))
    })?;

    if let Some(path) = &cli.api_key_file {
        config.api_key = None;
        config.api_key_file = Some(path.clone());
    }
    Ok(config)
}

/// Retry policy for every provider call the command makes.
pub fn retry_policy(cli: &Cli, attempt_timeout: Duration) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_attempts(cli.max_attempts)
        .with_attempt_timeout(attempt_timeout)
}

pub fn rag_config(cli: &Cli) -> docqa_core::Result<RagConfig> {
    let mut builder = RagConfig::builder()
        .chunk_size(cli.chunk_size)
        .chunk_overlap(cli.chunk_overlap)
        .top_k(cli.top_k);
    if let Some(temperature) = cli.temperature {
        builder = builder.temperature(temperature);
    }
    builder.build()
}

/// Resolve the provider from flags and the process environment, then run
/// the command against stdout.
pub async fn run(cli: Cli) -> Result<()> {
    let config = provider_config(&cli, |key| std::env::var(key).ok())?;
    let provider = create_provider(&config)?;
    info!(
        provider = provider.name(),
        embedding_model = provider.embedding_model(),
        completion_model = provider.completion_model(),
        "provider ready"
    );
    let policy = retry_policy(&cli, config.timeout);
    let mut stdout = std::io::stdout();
    execute(&cli, provider, policy, &mut stdout).await
}

/// Run the command with an already constructed provider.
pub async fn execute(
    cli: &Cli,
    provider: Arc<dyn ModelProvider>,
    policy: RetryPolicy,
    out: &mut dyn Write,
) -> Result<()> {
    match &cli.command {
        Command::Ingest { paths } => {
            let pipeline = pipeline(cli, provider, policy)?;
            let documents = load_documents(paths).await?;
            let report = pipeline.ingest(&documents).await?;
            writeln!(
                out,
                "Indexed {} chunks from {} document(s) into {} ({} dimensions)",
                report.chunks,
                report.documents,
                report.index_path.display(),
                report.dimensions
            )?;
            if report.skipped > 0 {
                writeln!(out, "Skipped {} document(s) with no extractable text", report.skipped)?;
            }
        }
        Command::Ask { question, sources } => {
            let pipeline = pipeline(cli, provider, policy)?;
            let answer = pipeline.ask(question).await?;
            print_answer(out, &answer, *sources)?;
        }
        Command::Chat { sources } => {
            let pipeline = pipeline(cli, provider, policy)?;
            let index = pipeline.load_index().await?;
            chat(&pipeline, &index, *sources, out).await?;
        }
        Command::Complete { prompt, image, system, max_tokens } => {
            let mut request = CompletionRequest::new(prompt.clone().unwrap_or_default());
            if let Some(path) = image {
                request = request.with_image(read_image(path).await?);
            }
            if let Some(system) = system {
                request = request.with_system(system.clone());
            }
            if let Some(temperature) = cli.temperature {
                request = request.with_temperature(temperature);
            }
            if let Some(max_tokens) = max_tokens {
                request = request.with_max_tokens(*max_tokens);
            }
            let text = retry(&policy, "complete", || provider.complete(&request)).await?;
            writeln!(out, "{}", text.trim())?;
        }
        Command::Restaurant { cuisine } => {
            let chain = restaurant_chain(provider)?;
            let values = chain.run([("cuisine".to_string(), cuisine.clone())].into()).await?;
            let name = values.get("restaurant_name").context("chain produced no restaurant_name")?;
            let menu = values.get("menu_items").context("chain produced no menu_items")?;

            writeln!(out, "{name}")?;
            writeln!(out)?;
            let items = parse_menu(menu);
            if items.is_empty() {
                debug!("menu reply was not a list of tuples; printing it as is");
                writeln!(out, "{menu}")?;
            }
            for (n, (item, price)) in items.iter().enumerate() {
                writeln!(out, "{:>3}. {item} ({price})", n + 1)?;
            }
        }
        Command::Generate { template, template_file, vars, system, max_tokens } => {
            let template = match (template, template_file) {
                (Some(text), _) => text.clone(),
                (None, Some(path)) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read template {}", path.display()))?,
                (None, None) => anyhow::bail!("either --template or --template-file is required"),
            };

            let mut stage = LlmStage::new("generate", provider, &template, GENERATED_TEXT)?
                .with_retry_policy(policy);
            if let Some(system) = system {
                stage = stage.with_system(system.clone());
            }
            if let Some(temperature) = cli.temperature {
                stage = stage.with_temperature(temperature);
            }
            if let Some(max_tokens) = max_tokens {
                stage = stage.with_max_tokens(*max_tokens);
            }

            let chain = template_chain(stage)?;
            let values = chain.run(vars.iter().cloned().collect()).await?;
            let text = values.get(GENERATED_TEXT).context("chain produced no text")?;
            writeln!(out, "{text}")?;
        }
    }
    Ok(())
}

async fn read_image(path: &Path) -> docqa_core::Result<ImagePart> {
    let mime_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImagePart::mime_type_for_extension)
        .ok_or_else(|| {
            DocqaError::Configuration(format!(
                "unsupported image type: {} (expected png, jpeg, webp or heic)",
                path.display()
            ))
        })?;
    let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            DocqaError::NotFound(format!("no such image: {}", path.display()))
        }
        _ => DocqaError::Storage(format!("failed to read {}: {e}", path.display())),
    })?;
    debug!(path = %path.display(), bytes = data.len(), mime_type, "loaded image");
    Ok(ImagePart::new(mime_type, data))
}

fn pipeline(cli: &Cli, provider: Arc<dyn ModelProvider>, policy: RetryPolicy) -> Result<RagPipeline> {
    Ok(RagPipeline::builder()
        .config(rag_config(cli)?)
        .provider(provider)
        .index_path(&cli.index)
        .retry_policy(policy)
        .build()?)
}

fn print_answer(out: &mut dyn Write, answer: &Answer, sources: bool) -> std::io::Result<()> {
    writeln!(out, "{}", answer.text.trim())?;
    if answer.not_in_context {
        writeln!(out, "(the indexed documents do not answer this question)")?;
    }
    if sources && !answer.sources.is_empty() {
        writeln!(out)?;
        writeln!(out, "Sources:")?;
        for (n, result) in answer.sources.iter().enumerate() {
            writeln!(
                out,
                "  [{}] {} chunk {} (score {:.3})",
                n + 1,
                result.chunk.document_id,
                result.chunk.index,
                result.score
            )?;
        }
    }
    Ok(())
}

async fn chat(
    pipeline: &RagPipeline,
    index: &VectorIndex,
    sources: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    writeln!(out, "Ask about your documents. Type 'exit' or press Ctrl-D to quit.")?;
    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }
        let _ = editor.add_history_entry(question);

        match pipeline.ask_with(index, question).await {
            Ok(answer) => print_answer(out, &answer, sources)?,
            Err(e) => writeln!(out, "{}", describe(&e))?,
        }
        writeln!(out)?;
    }
    Ok(())
}

fn describe(error: &DocqaError) -> String {
    format!("error [{}]: {error}", error.kind())
}

/// One-line rendering for the terminal, tagged with the error category when
/// the failure came from docqa.
pub fn render_error(error: &anyhow::Error) -> String {
    match error.chain().find_map(|cause| cause.downcast_ref::<DocqaError>()) {
        Some(docqa) => format!("error [{}]: {error:#}", docqa.kind()),
        None => format!("error: {error:#}"),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use docqa_core::ErrorKind;
    use docqa_model::ProviderKind;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("docqa").chain(args.iter().copied())).unwrap()
    }

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn flags_override_environment() {
        let cli = parse(&["--provider", "gemini", "--timeout-secs", "5", "chat"]);
        let config = provider_config(
            &cli,
            env(&[
                ("DOCQA_PROVIDER", "openai"),
                ("DOCQA_COMPLETION_MODEL", "gemini-1.5-pro"),
                ("GOOGLE_API_KEY", "g-key"),
                ("OPENAI_API_KEY", "o-key"),
            ]),
        )
        .unwrap();
        assert_eq!(config.kind, ProviderKind::Gemini);
        assert_eq!(config.completion_model(), "gemini-1.5-pro");
        assert_eq!(config.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn key_file_flag_beats_environment_key() {
        let cli = parse(&["--api-key-file", "/run/secrets/openai", "chat"]);
        let config = provider_config(&cli, env(&[("OPENAI_API_KEY", "o-key")])).unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.api_key_file.as_deref(), Some(std::path::Path::new("/run/secrets/openai")));
    }

    #[test]
    fn hosted_provider_without_key_is_a_configuration_error() {
        let cli = parse(&["chat"]);
        let config = provider_config(&cli, env(&[])).unwrap();
        let err = create_provider(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn inconsistent_chunking_flags_are_rejected() {
        let cli = parse(&["--chunk-size", "100", "--chunk-overlap", "100", "chat"]);
        assert_eq!(rag_config(&cli).unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn render_error_tags_docqa_errors() {
        let err = anyhow::Error::new(DocqaError::NotFound("no index at x.json; run ingest first".into()));
        assert_eq!(render_error(&err), "error [not_found]: Not found: no index at x.json; run ingest first");

        let wrapped = err.context("loading index");
        assert!(render_error(&wrapped).starts_with("error [not_found]: loading index: "));

        let other = anyhow::anyhow!("broken pipe");
        assert_eq!(render_error(&other), "error: broken pipe");
    }
}
