//! Ancestor resolution over the commit DAG
//!
//! Walks parent links breadth-first, following every parent so merge
//! commits contribute both lineages. The graph is finite and acyclic
//! (a commit can only name already-stored commits as parents), so every
//! walk terminates.
//!
//! Author: Moroya Sakamoto

use std::collections::{HashSet, VecDeque};

use crate::config::AncestorStrategy;
use crate::store::CommitStore;

// ── Walks ─────────────────────────────────────────────────────────────

/// Every commit reachable from `commit_id`, the commit itself first,
/// in BFS order. Empty if `commit_id` is not stored.
pub fn ancestors_of<'a>(store: &'a CommitStore, commit_id: &str) -> Vec<&'a str> {
    let mut order: Vec<&'a str> = Vec::new();
    let mut seen: HashSet<&'a str> = HashSet::new();
    let mut queue: VecDeque<&'a str> = VecDeque::new();

    if let Some(start) = store.get(commit_id) {
        seen.insert(start.id.as_str());
        queue.push_back(start.id.as_str());
    }

    while let Some(id) = queue.pop_front() {
        order.push(id);
        if let Some(parents) = store.parents(id) {
            for parent in parents {
                // Dangling parent ids are skipped, not followed.
                if let Some(parent) = store.get(parent) {
                    if seen.insert(parent.id.as_str()) {
                        queue.push_back(parent.id.as_str());
                    }
                }
            }
        }
    }

    order
}

/// True if `ancestor` is reachable from `descendant` (a commit is its own ancestor)
pub fn is_ancestor(store: &CommitStore, ancestor: &str, descendant: &str) -> bool {
    ancestors_of(store, descendant).contains(&ancestor)
}

/// Shared ancestor of `a` and `b`, chosen by `strategy`.
///
/// `FirstFound` returns the first commit in BFS order from `a` that `b`
/// can also reach. In diamond-shaped histories that can be an older
/// commit than the true merge base. `Lowest` returns the first shared
/// ancestor (same BFS order) that is not itself an ancestor of another
/// shared ancestor.
pub fn common_ancestor<'a>(
    store: &'a CommitStore,
    a: &str,
    b: &str,
    strategy: AncestorStrategy,
) -> Option<&'a str> {
    let theirs: HashSet<&str> = ancestors_of(store, b).into_iter().collect();
    let common: Vec<&'a str> = ancestors_of(store, a)
        .into_iter()
        .filter(|id| theirs.contains(id))
        .collect();

    match strategy {
        AncestorStrategy::FirstFound => common.first().copied(),
        AncestorStrategy::Lowest => {
            let dominated: HashSet<&str> = common
                .iter()
                .flat_map(|id| ancestors_of(store, id).into_iter().skip(1))
                .collect();
            common.into_iter().find(|id| !dominated.contains(id))
        }
    }
}
