//! Append-only commit store
//!
//! Commits indexed by id. Inserting never overwrites and nothing is ever
//! removed: history is not garbage collected, unreachable commits stay.
//!
//! Author: Moroya Sakamoto

use std::collections::HashMap;

use crate::commit::{Commit, CommitId};

/// Commit table (O(1) lookup via HashMap)
#[derive(Debug, Default)]
pub struct CommitStore {
    commits: HashMap<CommitId, Commit>,
    next_sequence: u64,
}

impl CommitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next inserted commit should carry
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Store a commit. Returns `false` and leaves the store untouched
    /// if the id is already taken.
    pub fn insert(&mut self, commit: Commit) -> bool {
        if self.commits.contains_key(&commit.id) {
            return false;
        }
        self.next_sequence = self.next_sequence.max(commit.sequence + 1);
        self.commits.insert(commit.id.clone(), commit);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Commit> {
        self.commits.get(id)
    }

    /// Parent ids of a commit
    pub fn parents(&self, id: &str) -> Option<&[CommitId]> {
        self.commits.get(id).map(|c| c.parent_ids.as_slice())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.commits.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}
