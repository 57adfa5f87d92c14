//! ABOUTME: Dependency graph, execution engine and input processor that run
//! ABOUTME: a Workflow's resources end to end

pub mod engine;
pub mod graph;
pub mod input_processor;

pub use engine::{Engine, EngineBuilder};
pub use graph::DependencyGraph;
pub use input_processor::{InputProcessor, InputResult, InputSource, InputSourceKind};
