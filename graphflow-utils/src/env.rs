//! ABOUTME: Backing implementation for the UnifiedApi `env()` field

use graphflow_core::error::{not_found_error, Result};

pub fn lookup_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| not_found_error(format!("environment variable '{name}' is not set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_var_is_not_found() {
        assert!(lookup_env("GRAPHFLOW_DEFINITELY_UNSET_VAR").is_err());
    }

    #[test]
    fn present_var_round_trips() {
        std::env::set_var("GRAPHFLOW_ENV_TEST_VAR", "hello");
        assert_eq!(lookup_env("GRAPHFLOW_ENV_TEST_VAR").unwrap(), "hello");
        std::env::remove_var("GRAPHFLOW_ENV_TEST_VAR");
    }
}
