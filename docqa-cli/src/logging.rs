//! Log setup for the binary.
//!
//! `RUST_LOG` takes precedence. Otherwise `-v` flags pick the level for the
//! docqa crates, and everything else stays at `warn`. Logs go to stderr so
//! answers on stdout can be piped.

use tracing_subscriber::EnvFilter;

const CRATES: [&str; 5] = ["docqa", "docqa_core", "docqa_model", "docqa_rag", "docqa_chain"];

/// The filter directive used when `RUST_LOG` is not set.
pub fn default_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    std::iter::once("warn".to_string())
        .chain(CRATES.iter().map(|krate| format!("{krate}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .try_init();
}
