//! ABOUTME: Clap argument definitions for the graphflow CLI
//! ABOUTME: Two commands: run a workflow file to its target, validate one

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "graphflow", about = "Run declarative AI-agent workflows", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Tracing verbosity; falls back to RUST_LOG when set.
    #[arg(long, global = true, default_value = "warn")]
    pub trace: TraceLevel,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a workflow file through to its target resource.
    Run {
        /// Path to the workflow document (YAML).
        workflow: PathBuf,

        /// Session id scoping the run's SessionStore namespace.
        #[arg(long, default_value = "default")]
        session: String,

        /// Output format for the final value.
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },
    /// Parse and structurally check a workflow file without executing it.
    Validate {
        /// Path to the workflow document (YAML).
        workflow: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Pretty,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<TraceLevel> for tracing::Level {
    fn from(level: TraceLevel) -> Self {
        match level {
            TraceLevel::Error => tracing::Level::ERROR,
            TraceLevel::Warn => tracing::Level::WARN,
            TraceLevel::Info => tracing::Level::INFO,
            TraceLevel::Debug => tracing::Level::DEBUG,
            TraceLevel::Trace => tracing::Level::TRACE,
        }
    }
}
