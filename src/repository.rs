//! Repository and branch manager
//!
//! Owns the commit store, the branch table and the checked-out branch.
//! Constructed explicitly by the host and passed around by reference;
//! there is no global instance. Commits are append-only and the branch
//! head is the only pointer that moves.
//!
//! Author: Moroya Sakamoto

use std::collections::BTreeMap;

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ancestry::{ancestors_of, common_ancestor, is_ancestor};
use crate::commit::{Author, Branch, Commit, CommitId, User};
use crate::config::{RepositoryConfig, DEFAULT_BRANCH};
use crate::diff::{detect_changes, ChangeRecord};
use crate::error::{Error, Result};
use crate::merge::{merge, MergeConflict};
use crate::roster::Roster;
use crate::store::CommitStore;
use crate::tree::{deep_clone, Snapshot};

/// Outcome of [`Repository::merge_branches`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub success: bool,
    /// New merge commit, or target's unchanged head when already merged.
    /// `None` on conflict.
    pub commit_id: Option<CommitId>,
    pub conflicts: Vec<MergeConflict>,
    /// Changes the merge applied to the target branch
    pub changes: Vec<ChangeRecord>,
}

impl MergeOutcome {
    fn conflicted(conflicts: Vec<MergeConflict>) -> Self {
        Self {
            success: false,
            commit_id: None,
            conflicts,
            changes: Vec::new(),
        }
    }
}

/// Repository: manages branches, commits and snapshots
#[derive(Debug)]
pub struct Repository {
    config: RepositoryConfig,
    /// Commits indexed by id
    store: CommitStore,
    /// Branches by name
    branches: BTreeMap<String, Branch>,
    /// Current branch name
    current_branch: String,
    current_user: Option<User>,
    roster: Roster,
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository {
    pub fn new() -> Self {
        Self::with_config(RepositoryConfig::default())
    }

    pub fn with_config(config: RepositoryConfig) -> Self {
        let mut store = CommitStore::new();
        let now = Utc::now();

        // Implicit empty root commit
        let root = Commit {
            id: Uuid::new_v4().to_string(),
            message: config.root_commit_message.clone(),
            author: Author::system(),
            timestamp: now,
            sequence: store.next_sequence(),
            parent_ids: Vec::new(),
            snapshot: Snapshot::new(),
            changes: Vec::new(),
            branch: String::from(DEFAULT_BRANCH),
        };
        let root_id = root.id.clone();
        store.insert(root);

        let mut branches = BTreeMap::new();
        branches.insert(
            String::from(DEFAULT_BRANCH),
            Branch {
                name: String::from(DEFAULT_BRANCH),
                head_commit_id: root_id,
                description: String::from("Default branch"),
                created_at: now,
                created_by: Author::system().id,
                is_protected: true,
                is_default: true,
            },
        );

        Self {
            config,
            store,
            branches,
            current_branch: String::from(DEFAULT_BRANCH),
            current_user: None,
            roster: Roster::new(),
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    // ── Users ─────────────────────────────────────────────────────────

    /// Set the author of subsequent commits and attach them to the roster
    /// on the current branch.
    pub fn set_current_user(&mut self, user: User) {
        debug!("current user set to {} <{}>", user.name, user.email);
        self.roster.join(user.clone(), &self.current_branch);
        self.current_user = Some(user);
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Attach another collaborator on `branch`
    pub fn join(&mut self, user: User, branch: &str) -> Result<()> {
        self.branch(branch)?;
        self.roster.join(user, branch);
        Ok(())
    }

    pub fn leave(&mut self, user_id: &str) {
        if self.roster.leave(user_id).is_some() {
            debug!("user {user_id} left the repository");
        }
    }

    // ── Branches ──────────────────────────────────────────────────────

    /// All branches, ordered by name
    pub fn list_branches(&self) -> Vec<&Branch> {
        self.branches.values().collect()
    }

    pub fn current_branch_name(&self) -> &str {
        &self.current_branch
    }

    pub fn current_branch(&self) -> Result<&Branch> {
        self.branch(&self.current_branch)
    }

    pub fn get_branch(&self, name: &str) -> Result<&Branch> {
        self.branch(name)
    }

    fn branch(&self, name: &str) -> Result<&Branch> {
        self.branches.get(name).ok_or_else(|| Error::BranchNotFound {
            name: String::from(name),
        })
    }

    fn branch_mut(&mut self, name: &str) -> Result<&mut Branch> {
        self.branches
            .get_mut(name)
            .ok_or_else(|| Error::BranchNotFound {
                name: String::from(name),
            })
    }

    /// Create a branch pointing at the head of `from` (default: current
    /// branch). History is shared, not copied.
    pub fn create_branch(&mut self, name: &str, from: Option<&str>) -> Result<&Branch> {
        validate_branch_name(name)?;
        if self.branches.contains_key(name) {
            return Err(Error::BranchExists {
                name: String::from(name),
            });
        }
        let from = from.unwrap_or(&self.current_branch).to_string();
        let head = self.branch(&from)?.head_commit_id.clone();
        let created_by = self
            .current_user
            .as_ref()
            .map(|u| u.id.clone())
            .unwrap_or_else(|| Author::system().id);

        info!("created branch '{name}' from '{from}' at {head}");
        let branch = self
            .branches
            .entry(String::from(name))
            .or_insert(Branch {
                name: String::from(name),
                head_commit_id: head,
                description: String::new(),
                created_at: Utc::now(),
                created_by,
                is_protected: false,
                is_default: false,
            });
        Ok(&*branch)
    }

    /// Check out a branch
    pub fn switch_branch(&mut self, name: &str) -> Result<()> {
        self.branch(name)?;
        self.current_branch = String::from(name);
        if let Some(user) = &self.current_user {
            self.roster.move_to(&user.id, name);
        }
        debug!("switched to branch '{name}'");
        Ok(())
    }

    /// Remove a branch pointer. Its commits stay in the store.
    pub fn delete_branch(&mut self, name: &str) -> Result<Branch> {
        let branch = self.branch(name)?;
        if !branch.is_deletable() {
            let name = String::from(name);
            return Err(if branch.is_default {
                Error::DefaultBranchDeletion { name }
            } else {
                Error::ProtectedBranchDeletion { name }
            });
        }
        if name == self.current_branch {
            return Err(Error::CurrentBranchDeletion {
                name: String::from(name),
            });
        }

        let removed = self
            .branches
            .remove(name)
            .ok_or_else(|| Error::BranchNotFound {
                name: String::from(name),
            })?;
        let moved = self.roster.reassign(name, DEFAULT_BRANCH);
        info!("deleted branch '{name}' ({moved} collaborator(s) moved to '{DEFAULT_BRANCH}')");
        Ok(removed)
    }

    /// Mark a branch protected or not. The default branch stays protected.
    pub fn set_branch_protection(&mut self, name: &str, protected: bool) -> Result<()> {
        let branch = self.branch_mut(name)?;
        branch.is_protected = protected || branch.is_default;
        Ok(())
    }

    pub fn set_branch_description(&mut self, name: &str, description: &str) -> Result<()> {
        self.branch_mut(name)?.description = String::from(description);
        Ok(())
    }

    // ── Commits ───────────────────────────────────────────────────────

    /// Record `snapshot` on the current branch.
    ///
    /// `changes` defaults to the diff against the current head. The
    /// snapshot is deep-copied, so later edits to the caller's working
    /// copy never reach history.
    pub fn create_commit(
        &mut self,
        snapshot: &Snapshot,
        message: &str,
        changes: Option<Vec<ChangeRecord>>,
    ) -> Result<CommitId> {
        let author = self.author()?;
        let branch = self.current_branch.clone();
        let head = self.branch(&branch)?.head_commit_id.clone();
        let changes = match changes {
            Some(changes) => changes,
            None => detect_changes(&self.commit(&head)?.snapshot, snapshot),
        };
        self.append(
            &branch,
            vec![head],
            deep_clone(snapshot),
            message,
            author,
            changes,
        )
    }

    fn author(&self) -> Result<Author> {
        self.current_user
            .as_ref()
            .map(Author::from)
            .ok_or(Error::NoCurrentUser)
    }

    /// Build a commit on `branch` and record it
    fn append(
        &mut self,
        branch: &str,
        parent_ids: Vec<CommitId>,
        snapshot: Snapshot,
        message: &str,
        author: Author,
        changes: Vec<ChangeRecord>,
    ) -> Result<CommitId> {
        let commit = Commit {
            id: Uuid::new_v4().to_string(),
            message: String::from(message),
            author,
            timestamp: Utc::now(),
            sequence: self.store.next_sequence(),
            parent_ids,
            snapshot,
            changes,
            branch: String::from(branch),
        };
        self.record(commit)
    }

    /// Store a commit, then advance its branch to it. Nothing moves if
    /// the branch is gone or the id is taken.
    fn record(&mut self, commit: Commit) -> Result<CommitId> {
        let tip = self
            .branches
            .get_mut(&commit.branch)
            .ok_or_else(|| Error::BranchNotFound {
                name: commit.branch.clone(),
            })?;
        let id = commit.id.clone();
        debug!(
            "commit {id} on '{}': {} change(s), {} parent(s)",
            commit.branch,
            commit.changes.len(),
            commit.parent_ids.len()
        );
        if !self.store.insert(commit) {
            return Err(Error::DuplicateCommit { id });
        }
        tip.head_commit_id = id.clone();
        Ok(id)
    }

    pub fn get_commit(&self, id: &str) -> Result<&Commit> {
        self.commit(id)
    }

    fn commit(&self, id: &str) -> Result<&Commit> {
        self.store.get(id).ok_or_else(|| Error::CommitNotFound {
            id: String::from(id),
        })
    }

    /// Total commit count, root included
    pub fn commit_count(&self) -> usize {
        self.store.len()
    }

    /// First-parent history of `branch` (default: current), newest first.
    /// `limit` defaults to the configured history limit.
    pub fn commit_history(&self, branch: Option<&str>, limit: Option<usize>) -> Result<Vec<&Commit>> {
        let branch = self.branch(branch.unwrap_or(&self.current_branch))?;
        let limit = limit.unwrap_or(self.config.default_history_limit);

        let mut history = Vec::new();
        let mut next = Some(branch.head_commit_id.as_str());
        while let Some(id) = next {
            if history.len() >= limit {
                break;
            }
            let commit = self.commit(id)?;
            history.push(commit);
            next = commit.first_parent();
        }
        Ok(history)
    }

    /// Copy of the snapshot at the head of `branch` (default: current)
    pub fn head_snapshot(&self, branch: Option<&str>) -> Result<Snapshot> {
        let branch = self.branch(branch.unwrap_or(&self.current_branch))?;
        Ok(deep_clone(&self.commit(&branch.head_commit_id)?.snapshot))
    }

    /// Uncommitted changes of a working copy against the current head
    pub fn pending_changes(&self, working: &Snapshot) -> Result<Vec<ChangeRecord>> {
        let head = &self.current_branch()?.head_commit_id;
        Ok(detect_changes(&self.commit(head)?.snapshot, working))
    }

    /// Changes between two stored commits
    pub fn diff_commits(&self, from: &str, to: &str) -> Result<Vec<ChangeRecord>> {
        Ok(detect_changes(
            &self.commit(from)?.snapshot,
            &self.commit(to)?.snapshot,
        ))
    }

    // ── Ancestry ──────────────────────────────────────────────────────

    /// Every commit reachable from `commit_id`, itself first
    pub fn ancestors(&self, commit_id: &str) -> Result<Vec<&str>> {
        self.commit(commit_id)?;
        Ok(ancestors_of(&self.store, commit_id))
    }

    /// Shared ancestor of two commits under the configured strategy
    pub fn common_ancestor(&self, a: &str, b: &str) -> Result<Option<&str>> {
        self.commit(a)?;
        self.commit(b)?;
        Ok(common_ancestor(
            &self.store,
            a,
            b,
            self.config.ancestor_strategy,
        ))
    }

    // ── Merge ─────────────────────────────────────────────────────────

    /// Merge `source` into `target`.
    ///
    /// Conflicts come back in the outcome with nothing persisted. On
    /// success a commit with parents `[target head, source head]` is
    /// created and `target` advances to it. A source already contained
    /// in target's history merges as a no-op without a new commit.
    pub fn merge_branches(&mut self, source: &str, target: &str, message: &str) -> Result<MergeOutcome> {
        let author = self.author()?;
        let source_head = self.branch(source)?.head_commit_id.clone();
        let target_head = self.branch(target)?.head_commit_id.clone();

        if is_ancestor(&self.store, &source_head, &target_head) {
            info!("merge '{source}' into '{target}': already up to date");
            return Ok(MergeOutcome {
                success: true,
                commit_id: Some(target_head),
                conflicts: Vec::new(),
                changes: Vec::new(),
            });
        }

        let empty = Snapshot::new();
        let base = match common_ancestor(
            &self.store,
            &source_head,
            &target_head,
            self.config.ancestor_strategy,
        ) {
            Some(id) => &self.commit(id)?.snapshot,
            None => &empty,
        };
        let source_snapshot = &self.commit(&source_head)?.snapshot;
        let target_snapshot = &self.commit(&target_head)?.snapshot;

        let result = merge(source_snapshot, target_snapshot, base);
        if !result.is_clean() {
            warn!(
                "merge '{source}' into '{target}' rejected: {} conflict(s)",
                result.conflicts.len()
            );
            return Ok(MergeOutcome::conflicted(result.conflicts));
        }

        let changes = detect_changes(target_snapshot, &result.merged);
        let commit_id = self.append(
            target,
            vec![target_head, source_head],
            result.merged,
            message,
            author,
            changes.clone(),
        )?;
        info!("merged '{source}' into '{target}' as {commit_id}");

        Ok(MergeOutcome {
            success: true,
            commit_id: Some(commit_id),
            conflicts: Vec::new(),
            changes,
        })
    }
}

fn validate_branch_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.chars().any(char::is_whitespace) {
        "name contains whitespace"
    } else {
        return Ok(());
    };
    Err(Error::InvalidBranchName {
        name: String::from(name),
        reason: String::from(reason),
    })
}
