//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use docqa_model::ProviderKind;
use docqa_rag::DEFAULT_INDEX_PATH;

#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version,
    about = "Ask questions about your documents with retrieval-augmented generation"
)]
pub struct Cli {
    /// Model provider: openai, gemini, huggingface or local [env: DOCQA_PROVIDER]
    #[arg(long, global = true)]
    pub provider: Option<ProviderKind>,

    /// Embedding model identifier [env: DOCQA_EMBEDDING_MODEL]
    #[arg(long, global = true)]
    pub embedding_model: Option<String>,

    /// Completion model identifier [env: DOCQA_COMPLETION_MODEL]
    #[arg(long, global = true)]
    pub completion_model: Option<String>,

    /// Base URL for the provider API [env: DOCQA_BASE_URL]
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// File containing the API key [env: DOCQA_API_KEY_FILE]
    #[arg(long, global = true)]
    pub api_key_file: Option<PathBuf>,

    /// Per-request timeout in seconds [env: DOCQA_TIMEOUT_SECS]
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Index file written by `ingest` and read by `ask` and `chat`.
    #[arg(long, global = true, env = "DOCQA_INDEX", default_value = DEFAULT_INDEX_PATH)]
    pub index: PathBuf,

    /// Attempts per provider call, including the first.
    #[arg(long, global = true, env = "DOCQA_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Sampling temperature for answers and completions.
    #[arg(long, global = true, env = "DOCQA_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Maximum chunk size in characters.
    #[arg(long, global = true, env = "DOCQA_CHUNK_SIZE", default_value_t = 10_000)]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[arg(long, global = true, env = "DOCQA_CHUNK_OVERLAP", default_value_t = 1_000)]
    pub chunk_overlap: usize,

    /// Chunks retrieved per question.
    #[arg(long, global = true, env = "DOCQA_TOP_K", default_value_t = 4)]
    pub top_k: usize,

    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG wins if set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the index from PDF, text or Markdown files and directories
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Answer one question from the index
    Ask {
        question: String,
        /// Print the chunks the answer was based on
        #[arg(long)]
        sources: bool,
    },

    /// Ask questions interactively; `exit` or Ctrl-D quits
    Chat {
        /// Print the chunks each answer was based on
        #[arg(long)]
        sources: bool,
    },

    /// Send one prompt straight to the completion model
    Complete {
        /// Prompt text; may be left out when an image is given
        #[arg(required_unless_present = "image")]
        prompt: Option<String>,
        /// Image to ask about (png, jpeg, webp, heic); Gemini only
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// System instruction sent ahead of the prompt
        #[arg(long)]
        system: Option<String>,
        /// Upper bound on generated tokens
        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Suggest a restaurant name and menu for a cuisine
    Restaurant { cuisine: String },

    /// Fill a `{name}` prompt template and send it to the completion model
    Generate {
        /// Template text, e.g. "Tell me about {name}"
        #[arg(long, required_unless_present = "template_file", conflicts_with = "template_file")]
        template: Option<String>,
        /// Read the template from a file instead
        #[arg(long, value_name = "PATH")]
        template_file: Option<PathBuf>,
        /// Template value as KEY=VALUE; repeat for each placeholder
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,
        /// System instruction sent ahead of the prompt
        #[arg(long)]
        system: Option<String>,
        /// Upper bound on generated tokens
        #[arg(long)]
        max_tokens: Option<u32>,
    },
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
