//! Error taxonomy
//!
//! Every variant is a usage error: a precondition the caller violated.
//! Merge conflicts are not errors and never appear here; they come back
//! as data inside [`MergeOutcome`](crate::repository::MergeOutcome).
//!
//! Author: Moroya Sakamoto

use thiserror::Error;

/// Errors raised by repository and branch operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A branch with this name already exists.
    #[error("Branch already exists: {name}")]
    BranchExists { name: String },

    /// No branch with this name exists.
    #[error("Branch not found: {name}")]
    BranchNotFound { name: String },

    /// The branch is marked protected.
    #[error("Cannot delete protected branch: {name}")]
    ProtectedBranchDeletion { name: String },

    /// The branch is the repository default (`main`).
    #[error("Cannot delete default branch: {name}")]
    DefaultBranchDeletion { name: String },

    /// The branch is currently checked out.
    #[error("Cannot delete the current branch: {name}")]
    CurrentBranchDeletion { name: String },

    /// Branch names must be non-empty and free of whitespace.
    #[error("Invalid branch name {name:?}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// A commit was requested before `set_current_user`.
    #[error("No current user: set_current_user must be called before committing")]
    NoCurrentUser,

    /// No commit with this id is stored.
    #[error("Commit not found: {id}")]
    CommitNotFound { id: String },

    /// A commit with this id is already stored.
    #[error("Commit already exists: {id}")]
    DuplicateCommit { id: String },

    /// The shared repository lock was poisoned by a panicking holder.
    #[error("Repository lock poisoned: {message}")]
    LockPoisoned { message: String },
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
