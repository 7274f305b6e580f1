//! Commit and branch model
//!
//! Commits are immutable, fully materialized snapshots plus metadata.
//! Branches are movable pointers into the shared commit DAG; the head
//! pointer is the only thing that ever changes.
//!
//! Author: Moroya Sakamoto

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::ChangeRecord;
use crate::tree::Snapshot;

/// Commit identifier (UUID v4 string)
pub type CommitId = String;

/// Authenticated user as handed over by the host application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl User {
    pub fn new(id: &str, name: &str, email: &str) -> Self {
        Self {
            id: String::from(id),
            name: String::from(name),
            email: String::from(email),
            avatar: None,
        }
    }
}

/// Authorship stamped on a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl Author {
    /// Author of the implicit root commit
    pub fn system() -> Self {
        Self {
            id: String::from("system"),
            name: String::from("system"),
            email: String::new(),
        }
    }
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// A commit in the history DAG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub message: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    /// Store-assigned creation counter, strictly increasing
    pub sequence: u64,
    /// Parent commits; the first entry is the primary lineage.
    /// Empty for the root, two entries (target, source) for merges.
    pub parent_ids: Vec<CommitId>,
    pub snapshot: Snapshot,
    /// Changes relative to the first parent
    pub changes: Vec<ChangeRecord>,
    /// Branch that was checked out when the commit was made
    pub branch: String,
}

impl Commit {
    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    pub fn first_parent(&self) -> Option<&str> {
        self.parent_ids.first().map(String::as_str)
    }
}

/// Branch pointer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub head_commit_id: CommitId,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// User id of the creator, `system` for the default branch
    pub created_by: String,
    pub is_protected: bool,
    pub is_default: bool,
}

impl Branch {
    /// Whether `delete_branch` may remove this branch
    pub fn is_deletable(&self) -> bool {
        !self.is_default && !self.is_protected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(parents: &[&str]) -> Commit {
        Commit {
            id: String::from("c"),
            message: String::from("msg"),
            author: Author::system(),
            timestamp: Utc::now(),
            sequence: 0,
            parent_ids: parents.iter().map(|p| String::from(*p)).collect(),
            snapshot: Snapshot::new(),
            changes: vec![],
            branch: String::from("main"),
        }
    }

    #[test]
    fn test_commit_shape() {
        let root = commit(&[]);
        assert!(root.is_root());
        assert!(!root.is_merge());
        assert_eq!(root.first_parent(), None);

        let merge = commit(&["target", "source"]);
        assert!(merge.is_merge());
        assert_eq!(merge.first_parent(), Some("target"));
    }

    #[test]
    fn test_author_from_user_drops_avatar() {
        let mut user = User::new("u1", "Ada", "ada@example.com");
        user.avatar = Some(String::from("https://example.com/a.png"));
        let author = Author::from(&user);
        assert_eq!(author.id, "u1");
        assert_eq!(author.email, "ada@example.com");
    }

    #[test]
    fn test_branch_deletable() {
        let mut branch = Branch {
            name: String::from("feature"),
            head_commit_id: String::from("c"),
            description: String::new(),
            created_at: Utc::now(),
            created_by: String::from("u1"),
            is_protected: false,
            is_default: false,
        };
        assert!(branch.is_deletable());
        branch.is_protected = true;
        assert!(!branch.is_deletable());
    }

    #[test]
    fn test_user_avatar_optional_in_json() {
        let user: User =
            serde_json::from_str(r#"{"id":"u","name":"N","email":"e@x"}"#).unwrap();
        assert!(user.avatar.is_none());
    }
}
