//! ABOUTME: Main entry point for the graphflow CLI
//! ABOUTME: Parses arguments, sets up tracing, dispatches to the run/validate commands

use anyhow::Result;
use clap::Parser;
use graphflow_cli::cli::{Cli, Commands, TraceLevel};
use graphflow_cli::commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.trace);

    match cli.command {
        Commands::Run { workflow, session, output } => commands::run(&workflow, &session, output).await,
        Commands::Validate { workflow } => commands::validate(&workflow).await,
    }
}

/// Priority: `RUST_LOG` > `--trace` flag > default (warn). Tracing goes to
/// stderr so stdout stays clean for `graphflow run`'s own JSON/pretty output.
fn setup_tracing(trace_level: TraceLevel) {
    use std::io;
    use tracing_subscriber::EnvFilter;

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .with_target(false)
            .init();
    } else {
        let level: tracing::Level = trace_level.into();
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(io::stderr)
            .with_target(false)
            .init();
    }
}
