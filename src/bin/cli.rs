//! declgraph CLI - inspect the declaration graph of C# sources.
//!
//! Usage:
//!   declgraph inspect <paths>...            # Declaration summaries
//!   declgraph inspect <paths>... --json     # Same, as JSON
//!   declgraph stats <paths>...              # Graph statistics
//!
//! Logging goes to stderr; set RUST_LOG (e.g. `declgraph=debug`) for detail.

use clap::Parser;
use declgraph::cli::{run, Cli};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
