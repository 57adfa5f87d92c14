//! ABOUTME: Re-exports the scalar classifier now owned by graphflow-core,
//! ABOUTME: since `Expression`'s custom Deserialize must call it directly

pub use graphflow_core::types::detect;
