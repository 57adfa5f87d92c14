//! ABOUTME: ActionId newtype identifying a resource within a workflow

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a resource within a single workflow.
///
/// Unlike `ComponentId`-style UUIDs used elsewhere in the ecosystem, an
/// `ActionId` is author-assigned in the workflow document (`metadata.actionId`)
/// and is only required to be unique *within* its own workflow. The
/// dependency graph uses these strings directly as arena keys rather than
/// holding pointers between nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(String);

impl ActionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ActionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ActionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
