//! # docqa-cli
//!
//! The `docqa` command: ingest documents into a local index, then ask
//! questions about them once or in an interactive session. The other
//! commands talk to the completion model directly.
//!
//! ```text
//! docqa ingest handbook.pdf notes/
//! docqa ask "What is the refund policy?" --sources
//! docqa chat
//! docqa complete "Explain borrowing in one sentence"
//! docqa complete "What is in this picture?" --image cat.png --provider gemini
//! docqa generate --template "Tell me about {name}" --var name="Ada Lovelace"
//! docqa restaurant Indian
//! ```
//!
//! Provider settings come from flags or `DOCQA_*` variables, and a `.env`
//! file in the working directory is loaded first.

pub mod cli;
pub mod commands;
pub mod logging;

pub use cli::{Cli, Command};
pub use commands::{execute, render_error, run};
pub use logging::init_tracing;
