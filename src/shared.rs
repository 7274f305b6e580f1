//! Thread-safe repository handle
//!
//! One mutex guards the whole repository: the branch table, the commit
//! store and the checked-out branch change together or not at all.
//! Everything handed out is an owned copy, never a reference into
//! stored history.
//!
//! Author: Moroya Sakamoto

use std::sync::{Arc, Mutex, MutexGuard};

use crate::commit::{Branch, Commit, CommitId, User};
use crate::diff::ChangeRecord;
use crate::error::{Error, Result};
use crate::repository::{MergeOutcome, Repository};
use crate::tree::Snapshot;

/// Cloneable handle to a repository shared across threads
#[derive(Debug, Clone, Default)]
pub struct SharedRepository {
    inner: Arc<Mutex<Repository>>,
}

impl SharedRepository {
    pub fn new(repository: Repository) -> Self {
        Self {
            inner: Arc::new(Mutex::new(repository)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Repository>> {
        self.inner.lock().map_err(|e| Error::LockPoisoned {
            message: e.to_string(),
        })
    }

    /// Run `f` with exclusive access to the repository
    pub fn with<T>(&self, f: impl FnOnce(&mut Repository) -> Result<T>) -> Result<T> {
        let mut repo = self.lock()?;
        f(&mut repo)
    }

    pub fn set_current_user(&self, user: User) -> Result<()> {
        self.lock()?.set_current_user(user);
        Ok(())
    }

    pub fn list_branches(&self) -> Result<Vec<Branch>> {
        Ok(self.lock()?.list_branches().into_iter().cloned().collect())
    }

    pub fn current_branch(&self) -> Result<Branch> {
        self.lock()?.current_branch().cloned()
    }

    pub fn create_branch(&self, name: &str, from: Option<&str>) -> Result<Branch> {
        self.lock()?.create_branch(name, from).cloned()
    }

    pub fn switch_branch(&self, name: &str) -> Result<()> {
        self.lock()?.switch_branch(name)
    }

    pub fn delete_branch(&self, name: &str) -> Result<Branch> {
        self.lock()?.delete_branch(name)
    }

    pub fn create_commit(
        &self,
        snapshot: &Snapshot,
        message: &str,
        changes: Option<Vec<ChangeRecord>>,
    ) -> Result<CommitId> {
        self.lock()?.create_commit(snapshot, message, changes)
    }

    pub fn commit_history(&self, branch: Option<&str>, limit: Option<usize>) -> Result<Vec<Commit>> {
        Ok(self
            .lock()?
            .commit_history(branch, limit)?
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn head_snapshot(&self, branch: Option<&str>) -> Result<Snapshot> {
        self.lock()?.head_snapshot(branch)
    }

    pub fn pending_changes(&self, working: &Snapshot) -> Result<Vec<ChangeRecord>> {
        self.lock()?.pending_changes(working)
    }

    pub fn merge_branches(&self, source: &str, target: &str, message: &str) -> Result<MergeOutcome> {
        self.lock()?.merge_branches(source, target, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Component;
    use std::thread;

    fn shared() -> SharedRepository {
        let repo = SharedRepository::new(Repository::new());
        repo.set_current_user(User::new("u1", "Ada", "ada@example.com"))
            .unwrap();
        repo
    }

    #[test]
    fn test_commits_from_many_threads() {
        let repo = shared();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let repo = repo.clone();
                thread::spawn(move || {
                    let snap = Snapshot::from(vec![Component::new(&format!("c{i}"), "box", "Box")]);
                    repo.create_commit(&snap, "parallel", None).unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let history = repo.commit_history(None, None).unwrap();
        assert_eq!(history.len(), 5);
        assert!(history.windows(2).all(|w| w[1].id == w[0].parent_ids[0]));
    }

    #[test]
    fn test_returned_values_are_copies() {
        let repo = shared();
        let snap = Snapshot::from(vec![Component::new("x", "box", "X")]);
        repo.create_commit(&snap, "c1", None).unwrap();

        let mut history = repo.commit_history(None, Some(1)).unwrap();
        history[0].snapshot.push(Component::new("y", "box", "Y"));
        assert_eq!(repo.head_snapshot(None).unwrap().node_count(), 1);
    }

    #[test]
    fn test_branch_round_trip_through_handle() {
        let repo = shared();
        repo.create_branch("feature", None).unwrap();
        repo.switch_branch("feature").unwrap();
        assert_eq!(repo.current_branch().unwrap().name, "feature");
        assert_eq!(repo.list_branches().unwrap().len(), 2);
        assert!(matches!(
            repo.delete_branch("feature"),
            Err(Error::CurrentBranchDeletion { .. })
        ));
        let outcome = repo.merge_branches("feature", "main", "m").unwrap();
        assert!(outcome.success);
    }

    #[test]
    fn test_with_gives_exclusive_access() {
        let repo = shared();
        let count = repo.with(|r| Ok(r.commit_count())).unwrap();
        assert_eq!(count, 1);
        let pending = repo
            .pending_changes(&Snapshot::from(vec![Component::new("x", "box", "X")]))
            .unwrap();
        assert_eq!(pending.len(), 2);
    }
}
