//! 3-way structural merge
//!
//! Classifies every component id across base, source and target by
//! presence and modification, then rebuilds one tree from the resolved
//! nodes. A node counts as modified when its own fields or its parent
//! changed; edits to a child never mark the parent as modified.
//!
//! | base    | source       | target       | result                    |
//! |---------|--------------|--------------|---------------------------|
//! | present | unchanged    | unchanged    | keep                      |
//! | present | changed      | unchanged    | take source               |
//! | present | unchanged    | changed      | take target               |
//! | present | changed      | changed      | equal: take; else conflict|
//! | absent  | added        | absent       | take source               |
//! | absent  | absent       | added        | take target               |
//! | absent  | added        | added        | equal: take; else conflict|
//! | present | deleted      | unchanged    | delete                    |
//! | present | unchanged    | deleted      | delete                    |
//! | present | deleted      | changed      | conflict                  |
//! | present | changed      | deleted      | conflict                  |
//!
//! A kept parent's child order merges the same way, compared on the
//! children all three sides share: a reorder on one side is taken,
//! different reorders on both sides conflict on the parent. Root order is
//! always target first.
//!
//! Merging is all-or-nothing: any conflict leaves the merged snapshot empty.
//!
//! Author: Moroya Sakamoto

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tree::{fields_equal, walk, Component, ComponentId, FlatNode, Snapshot};

/// Granularity of a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Component,
}

/// Merge conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub id: String,
    pub kind: ConflictKind,
    pub component_id: ComponentId,
    /// Value at the common ancestor, `None` if the component was added
    pub base_value: Option<Component>,
    /// Source side, `None` if deleted there
    pub incoming_value: Option<Component>,
    /// Target side, `None` if deleted there
    pub current_value: Option<Component>,
}

/// Merge result
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    /// Merged tree; empty whenever `conflicts` is non-empty
    pub merged: Snapshot,
    /// Conflicts that need manual resolution, ascending by component id
    pub conflicts: Vec<MergeConflict>,
}

impl MergeResult {
    /// True if merge is clean (no conflicts)
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

type Index<'a> = BTreeMap<&'a str, FlatNode<'a>>;

fn index(snapshot: &Snapshot) -> Index<'_> {
    walk(snapshot)
        .into_iter()
        .map(|n| (n.node.id.as_str(), n))
        .collect()
}

fn same(a: &FlatNode<'_>, b: &FlatNode<'_>) -> bool {
    a.parent == b.parent && fields_equal(a.node, b.node)
}

/// `seq` restricted to ids present in every one of `others`
fn relative_order<'s>(seq: &[&'s str], others: [&[&str]; 2]) -> Vec<&'s str> {
    seq.iter()
        .copied()
        .filter(|id| others.iter().all(|o| o.contains(id)))
        .collect()
}

fn conflict(
    id: &str,
    base: Option<&FlatNode<'_>>,
    incoming: Option<&FlatNode<'_>>,
    current: Option<&FlatNode<'_>>,
) -> MergeConflict {
    MergeConflict {
        id: Uuid::new_v4().to_string(),
        kind: ConflictKind::Component,
        component_id: String::from(id),
        base_value: base.map(|n| n.node.clone()),
        incoming_value: incoming.map(|n| n.node.clone()),
        current_value: current.map(|n| n.node.clone()),
    }
}

/// Merge `source` into `target` using `base` as the common ancestor
/// (pass an empty snapshot when the histories share none).
///
/// The merged tree keeps target's child order for ids target already
/// places under a parent, then appends the rest in source order. Parents
/// whose children were reordered only in source lead with source order.
pub fn merge(source: &Snapshot, target: &Snapshot, base: &Snapshot) -> MergeResult {
    let base_ix = index(base);
    let source_ix = index(source);
    let target_ix = index(target);

    let ids: BTreeSet<&str> = base_ix
        .keys()
        .chain(source_ix.keys())
        .chain(target_ix.keys())
        .copied()
        .collect();

    let mut resolved: BTreeMap<&str, FlatNode<'_>> = BTreeMap::new();
    let mut conflicts: BTreeMap<&str, MergeConflict> = BTreeMap::new();

    for id in ids {
        let b = base_ix.get(id);
        let s = source_ix.get(id);
        let t = target_ix.get(id);
        match (b, s, t) {
            (Some(b), Some(s), Some(t)) => match (same(b, s), same(b, t)) {
                (true, _) => {
                    resolved.insert(id, *t);
                }
                (false, true) => {
                    resolved.insert(id, *s);
                }
                (false, false) if same(s, t) => {
                    resolved.insert(id, *t);
                }
                (false, false) => {
                    conflicts.insert(id, conflict(id, Some(b), Some(s), Some(t)));
                }
            },
            (None, Some(s), None) => {
                resolved.insert(id, *s);
            }
            (None, None, Some(t)) => {
                resolved.insert(id, *t);
            }
            (None, Some(s), Some(t)) => {
                if same(s, t) {
                    resolved.insert(id, *t);
                } else {
                    conflicts.insert(id, conflict(id, None, Some(s), Some(t)));
                }
            }
            (Some(b), None, Some(t)) => {
                if !same(b, t) {
                    conflicts.insert(id, conflict(id, Some(b), None, Some(t)));
                }
            }
            (Some(b), Some(s), None) => {
                if !same(b, s) {
                    conflicts.insert(id, conflict(id, Some(b), Some(s), None));
                }
            }
            (Some(_), None, None) | (None, None, None) => {}
        }
    }

    // A kept node whose parent was deleted on one side: the deletion
    // cannot win without dropping the other side's work.
    for node in resolved.values() {
        if let Some(parent) = node.parent {
            if !resolved.contains_key(parent) && !conflicts.contains_key(parent) {
                conflicts.insert(
                    parent,
                    conflict(
                        parent,
                        base_ix.get(parent),
                        source_ix.get(parent),
                        target_ix.get(parent),
                    ),
                );
            }
        }
    }

    let mut source_led: BTreeSet<&str> = BTreeSet::new();
    for &id in resolved.keys() {
        if conflicts.contains_key(id) {
            continue;
        }
        let (Some(b), Some(s), Some(t)) = (base_ix.get(id), source_ix.get(id), target_ix.get(id))
        else {
            continue;
        };
        let (b, s, t) = (b.node.child_ids(), s.node.child_ids(), t.node.child_ids());
        let base_order = relative_order(&b, [s.as_slice(), t.as_slice()]);
        let source_order = relative_order(&s, [b.as_slice(), t.as_slice()]);
        let target_order = relative_order(&t, [b.as_slice(), s.as_slice()]);

        if source_order == base_order {
            continue;
        }
        if target_order == base_order {
            source_led.insert(id);
        } else if source_order != target_order {
            conflicts.insert(
                id,
                conflict(id, base_ix.get(id), source_ix.get(id), target_ix.get(id)),
            );
        }
    }

    if !conflicts.is_empty() {
        return MergeResult {
            merged: Snapshot::new(),
            conflicts: conflicts.into_values().collect(),
        };
    }

    let mut builder = TreeBuilder {
        resolved: &resolved,
        source,
        target,
        source_ix: &source_ix,
        target_ix: &target_ix,
        source_led: &source_led,
        placed: BTreeSet::new(),
    };
    let merged = Snapshot::from(builder.children_of(None));

    // Parent moves from both sides can close a cycle that no root reaches.
    let unplaced: Vec<&str> = resolved
        .keys()
        .copied()
        .filter(|id| !builder.placed.contains(id))
        .collect();
    if !unplaced.is_empty() {
        return MergeResult {
            merged: Snapshot::new(),
            conflicts: unplaced
                .into_iter()
                .map(|id| {
                    conflict(
                        id,
                        base_ix.get(id),
                        source_ix.get(id),
                        target_ix.get(id),
                    )
                })
                .collect(),
        };
    }

    MergeResult {
        merged,
        conflicts: Vec::new(),
    }
}

struct TreeBuilder<'r, 'a> {
    resolved: &'r BTreeMap<&'a str, FlatNode<'a>>,
    source: &'a Snapshot,
    target: &'a Snapshot,
    source_ix: &'r Index<'a>,
    target_ix: &'r Index<'a>,
    /// Parents rebuilt in source's child order
    source_led: &'r BTreeSet<&'a str>,
    placed: BTreeSet<&'a str>,
}

impl<'r, 'a> TreeBuilder<'r, 'a> {
    fn sequence(snapshot: &'a Snapshot, ix: &Index<'a>, parent: Option<&str>) -> Vec<&'a str> {
        match parent {
            None => snapshot.root_ids(),
            Some(p) => ix.get(p).map(|n| n.node.child_ids()).unwrap_or_default(),
        }
    }

    fn children_of(&mut self, parent: Option<&'a str>) -> Vec<Component> {
        let resolved = self.resolved;
        let mut order: Vec<&'a str> = Vec::new();
        let target = Self::sequence(self.target, self.target_ix, parent);
        let source = Self::sequence(self.source, self.source_ix, parent);
        let (lead, rest) = match parent {
            Some(p) if self.source_led.contains(p) => (source, target),
            _ => (target, source),
        };
        let candidates = lead
            .into_iter()
            .chain(rest)
            .chain(
                resolved
                    .iter()
                    .filter(|(_, n)| n.parent == parent)
                    .map(|(id, _)| *id),
            );
        for id in candidates {
            let belongs = resolved.get(id).is_some_and(|n| n.parent == parent);
            if belongs && !order.contains(&id) && !self.placed.contains(id) {
                order.push(id);
            }
        }

        let mut out = Vec::with_capacity(order.len());
        for id in order {
            let Some(entry) = resolved.get(id) else {
                continue;
            };
            self.placed.insert(id);
            let mut node = entry.node.detached();
            node.children = self.children_of(Some(id));
            out.push(node);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{flatten, structural_equals};
    use serde_json::json;

    fn text(id: &str, value: &str) -> Component {
        Component::new(id, "text", id).with_content("text", value)
    }

    fn snap(nodes: Vec<Component>) -> Snapshot {
        Snapshot::from(nodes)
    }

    fn content(c: &Option<Component>) -> Option<serde_json::Value> {
        c.as_ref().map(|c| c.content["text"].clone())
    }

    #[test]
    fn test_clean_merge_non_overlapping() {
        let base = snap(vec![text("x", "A"), text("y", "A")]);
        let source = snap(vec![text("x", "B"), text("y", "A")]);
        let target = snap(vec![text("x", "A"), text("y", "B")]);

        let result = merge(&source, &target, &base);
        assert!(result.is_clean());
        let flat = flatten(&result.merged);
        assert_eq!(flat["x"].content["text"], json!("B"));
        assert_eq!(flat["y"].content["text"], json!("B"));
    }

    #[test]
    fn test_conflict_same_node_different_values() {
        let base = snap(vec![text("x", "A")]);
        let source = snap(vec![text("x", "B")]);
        let target = snap(vec![text("x", "C")]);

        let result = merge(&source, &target, &base);
        assert!(!result.is_clean());
        assert_eq!(result.conflicts.len(), 1);
        let c = &result.conflicts[0];
        assert_eq!(c.component_id, "x");
        assert_eq!(c.kind, ConflictKind::Component);
        assert_eq!(content(&c.base_value), Some(json!("A")));
        assert_eq!(content(&c.incoming_value), Some(json!("B")));
        assert_eq!(content(&c.current_value), Some(json!("C")));
        assert!(result.merged.is_empty());
    }

    #[test]
    fn test_auto_resolve_identical_changes() {
        let base = snap(vec![text("x", "A")]);
        let source = snap(vec![text("x", "B")]);
        let target = snap(vec![text("x", "B")]);

        let result = merge(&source, &target, &base);
        assert!(result.is_clean());
        assert!(structural_equals(&result.merged, &target));
    }

    #[test]
    fn test_empty_merge() {
        let empty = Snapshot::new();
        let result = merge(&empty, &empty, &empty);
        assert!(result.is_clean());
        assert!(result.merged.is_empty());
    }

    #[test]
    fn test_unchanged_everywhere_keeps_base() {
        let base = snap(vec![text("x", "A")]);
        let result = merge(&base, &base, &base);
        assert!(result.is_clean());
        assert!(structural_equals(&result.merged, &base));
    }

    #[test]
    fn test_additions_from_both_sides() {
        let base = snap(vec![text("x", "A")]);
        let source = snap(vec![text("s", "S"), text("x", "A")]);
        let target = snap(vec![text("x", "A"), text("t", "T")]);

        let result = merge(&source, &target, &base);
        assert!(result.is_clean());
        // target order first, source-only additions appended
        assert_eq!(result.merged.root_ids(), vec!["x", "t", "s"]);
    }

    #[test]
    fn test_same_addition_on_both_sides() {
        let base = Snapshot::new();
        let source = snap(vec![text("n", "N")]);
        let target = snap(vec![text("n", "N")]);
        let result = merge(&source, &target, &base);
        assert!(result.is_clean());
        assert_eq!(result.merged.root_ids(), vec!["n"]);
    }

    #[test]
    fn test_divergent_additions_conflict_without_base() {
        let base = Snapshot::new();
        let source = snap(vec![text("n", "one")]);
        let target = snap(vec![text("n", "two")]);
        let result = merge(&source, &target, &base);
        assert_eq!(result.conflicts.len(), 1);
        assert!(result.conflicts[0].base_value.is_none());
        assert_eq!(content(&result.conflicts[0].incoming_value), Some(json!("one")));
    }

    #[test]
    fn test_deletion_wins_over_unchanged() {
        let base = snap(vec![text("x", "A"), text("y", "A")]);
        let source = snap(vec![text("y", "A")]);
        let target = snap(vec![text("x", "A"), text("y", "A")]);
        let result = merge(&source, &target, &base);
        assert!(result.is_clean());
        assert_eq!(result.merged.root_ids(), vec!["y"]);

        let result = merge(&target, &source, &base);
        assert!(result.is_clean());
        assert_eq!(result.merged.root_ids(), vec!["y"]);
    }

    #[test]
    fn test_deleted_on_both_sides() {
        let base = snap(vec![text("x", "A"), text("y", "A")]);
        let both = snap(vec![text("y", "A")]);
        let result = merge(&both, &both, &base);
        assert!(result.is_clean());
        assert_eq!(result.merged.root_ids(), vec!["y"]);
    }

    #[test]
    fn test_delete_vs_modify_conflicts() {
        let base = snap(vec![text("x", "A")]);
        let deleted = Snapshot::new();
        let modified = snap(vec![text("x", "B")]);

        let result = merge(&deleted, &modified, &base);
        assert_eq!(result.conflicts.len(), 1);
        let c = &result.conflicts[0];
        assert!(c.incoming_value.is_none());
        assert_eq!(content(&c.current_value), Some(json!("B")));

        let result = merge(&modified, &deleted, &base);
        assert_eq!(result.conflicts.len(), 1);
        let c = &result.conflicts[0];
        assert_eq!(content(&c.incoming_value), Some(json!("B")));
        assert!(c.current_value.is_none());
        assert_eq!(content(&c.base_value), Some(json!("A")));
    }

    #[test]
    fn test_child_edit_does_not_conflict_with_parent_edit() {
        let page = |title: &str, bg: &str| {
            snap(vec![Component::new("hero", "section", "Hero")
                .with_style("background", bg)
                .with_child(text("title", title))])
        };
        let base = page("Hi", "white");
        let source = page("Hello", "white");
        let target = page("Hi", "black");

        let result = merge(&source, &target, &base);
        assert!(result.is_clean());
        assert!(structural_equals(&result.merged, &page("Hello", "black")));
    }

    #[test]
    fn test_nested_addition_lands_under_parent() {
        let base = snap(vec![Component::new("list", "list", "List").with_child(text("a", "a"))]);
        let source = snap(vec![Component::new("list", "list", "List")
            .with_child(text("a", "a"))
            .with_child(text("b", "b"))]);
        let target = snap(vec![Component::new("list", "list", "List")
            .with_child(text("z", "z"))
            .with_child(text("a", "a"))]);

        let result = merge(&source, &target, &base);
        assert!(result.is_clean());
        let list = result.merged.find("list").unwrap();
        assert_eq!(list.child_ids(), vec!["z", "a", "b"]);
    }

    fn list(order: &[&str]) -> Snapshot {
        let mut node = Component::new("list", "list", "List");
        for id in order {
            node = node.with_child(text(id, id));
        }
        snap(vec![node])
    }

    #[test]
    fn test_child_reorder_in_source_is_taken() {
        let base = list(&["a", "b"]);
        let source = list(&["b", "a"]);

        let result = merge(&source, &base, &base);
        assert!(result.is_clean());
        assert_eq!(result.merged.find("list").unwrap().child_ids(), vec!["b", "a"]);
    }

    #[test]
    fn test_child_reorder_in_target_is_kept() {
        let base = list(&["a", "b", "c"]);
        let source = list(&["a", "b", "c", "d"]);
        let target = list(&["c", "a", "b"]);

        let result = merge(&source, &target, &base);
        assert!(result.is_clean());
        assert_eq!(
            result.merged.find("list").unwrap().child_ids(),
            vec!["c", "a", "b", "d"]
        );
    }

    #[test]
    fn test_child_reorder_survives_additions() {
        let base = list(&["a", "b"]);
        let source = list(&["b", "a", "s"]);
        let target = list(&["a", "b", "t"]);

        let result = merge(&source, &target, &base);
        assert!(result.is_clean());
        assert_eq!(
            result.merged.find("list").unwrap().child_ids(),
            vec!["b", "a", "s", "t"]
        );
    }

    #[test]
    fn test_divergent_child_reorders_conflict_on_parent() {
        let base = list(&["a", "b", "c"]);
        let source = list(&["b", "a", "c"]);
        let target = list(&["a", "c", "b"]);

        let result = merge(&source, &target, &base);
        assert_eq!(result.conflicts.len(), 1);
        let c = &result.conflicts[0];
        assert_eq!(c.component_id, "list");
        assert_eq!(c.incoming_value.as_ref().unwrap().child_ids(), vec!["b", "a", "c"]);
        assert_eq!(c.current_value.as_ref().unwrap().child_ids(), vec!["a", "c", "b"]);
        assert!(result.merged.is_empty());
    }

    #[test]
    fn test_same_child_reorder_on_both_sides() {
        let base = list(&["a", "b"]);
        let both = list(&["b", "a"]);
        let result = merge(&both, &both, &base);
        assert!(result.is_clean());
        assert!(structural_equals(&result.merged, &both));
    }

    #[test]
    fn test_move_on_one_side_is_taken() {
        let base = snap(vec![
            Component::new("left", "col", "Left").with_child(text("card", "c")),
            Component::new("right", "col", "Right"),
        ]);
        let source = snap(vec![
            Component::new("left", "col", "Left"),
            Component::new("right", "col", "Right").with_child(text("card", "c")),
        ]);
        let result = merge(&source, &base, &base);
        assert!(result.is_clean());
        assert_eq!(result.merged.parent_of("card"), Some("right"));
    }

    #[test]
    fn test_addition_under_deleted_parent_conflicts_on_parent() {
        let base = snap(vec![Component::new("box", "box", "Box")]);
        let source = Snapshot::new();
        let target = snap(vec![Component::new("box", "box", "Box").with_child(text("new", "n"))]);

        let result = merge(&source, &target, &base);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].component_id, "box");
        assert!(result.conflicts[0].incoming_value.is_none());
    }

    #[test]
    fn test_crossed_moves_conflict() {
        let base = snap(vec![Component::new("a", "box", "A"), Component::new("b", "box", "B")]);
        let source = snap(vec![Component::new("b", "box", "B").with_child(Component::new("a", "box", "A"))]);
        let target = snap(vec![Component::new("a", "box", "A").with_child(Component::new("b", "box", "B"))]);

        let result = merge(&source, &target, &base);
        assert!(!result.is_clean());
        let ids: Vec<_> = result.conflicts.iter().map(|c| c.component_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_conflicts_sorted_by_component_id() {
        let base = snap(vec![text("b", "0"), text("a", "0")]);
        let source = snap(vec![text("b", "1"), text("a", "1")]);
        let target = snap(vec![text("b", "2"), text("a", "2")]);
        let result = merge(&source, &target, &base);
        let ids: Vec<_> = result.conflicts.iter().map(|c| c.component_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
