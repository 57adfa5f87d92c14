//! ABOUTME: Subcommand handlers dispatched by main.rs after arg parsing

mod run;
mod validate;

pub use run::run;
pub use validate::validate;
