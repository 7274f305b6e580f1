//! Repository configuration
//!
//! All fields default, so a host can deserialize a partial document from
//! whatever format it already uses.
//!
//! Author: Moroya Sakamoto

use serde::{Deserialize, Serialize};

/// Name of the default branch; always exists, never deletable.
pub const DEFAULT_BRANCH: &str = "main";

/// How `common_ancestor` picks between several shared ancestors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AncestorStrategy {
    /// First shared ancestor in BFS order from the first commit.
    /// Cheap, but not always the most recent one in diamond histories.
    FirstFound,
    /// A shared ancestor that is not an ancestor of any other shared ancestor.
    #[default]
    Lowest,
}

/// Tunables for a [`Repository`](crate::repository::Repository)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub ancestor_strategy: AncestorStrategy,
    /// Limit applied by `commit_history` when the caller passes none
    pub default_history_limit: usize,
    /// Message of the empty root commit created with the repository
    pub root_commit_message: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            ancestor_strategy: AncestorStrategy::default(),
            default_history_limit: 50,
            root_commit_message: String::from("initial commit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RepositoryConfig::default();
        assert_eq!(config.ancestor_strategy, AncestorStrategy::Lowest);
        assert_eq!(config.default_history_limit, 50);
        assert_eq!(config.root_commit_message, "initial commit");
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: RepositoryConfig =
            serde_json::from_str(r#"{ "ancestor_strategy": "first_found" }"#).unwrap();
        assert_eq!(config.ancestor_strategy, AncestorStrategy::FirstFound);
        assert_eq!(config.default_history_limit, 50);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: RepositoryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RepositoryConfig::default());
    }
}
