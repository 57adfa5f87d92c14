//! ABOUTME: Command-line interface library for the graphflow workflow runtime
//! ABOUTME: Argument parsing, workflow loading and the engine wiring the binary drives

pub mod cli;
pub mod commands;
pub mod venv;
pub mod wiring;
pub mod workflow_loader;

pub use cli::OutputFormat;
