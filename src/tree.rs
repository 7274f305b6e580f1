//! Component tree model
//!
//! A snapshot is an ordered forest of UI components. Parent/child is pure
//! containment: a node owns its `children` and never points back at its
//! parent, so "who is the parent of X" is answered by searching.
//!
//! Cloning a [`Snapshot`] deep-copies every node; nothing is shared
//! between a clone and its source.
//!
//! Author: Moroya Sakamoto

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique component identifier within a snapshot
pub type ComponentId = String;

/// Ordered-key property map. Equality ignores insertion order.
pub type PropertyMap = serde_json::Map<String, Value>;

fn default_visible() -> bool {
    true
}

/// UI component node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Unique identifier within the snapshot
    pub id: ComponentId,
    /// Type tag (e.g. "heading", "button", "section")
    #[serde(rename = "type")]
    pub component_type: String,
    /// Display name shown in the layer panel
    pub name: String,
    #[serde(default)]
    pub content: PropertyMap,
    #[serde(default)]
    pub style: PropertyMap,
    /// Owned children, in render order
    #[serde(default)]
    pub children: Vec<Component>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
}

impl Component {
    pub fn new(id: &str, component_type: &str, name: &str) -> Self {
        Self {
            id: String::from(id),
            component_type: String::from(component_type),
            name: String::from(name),
            content: PropertyMap::new(),
            style: PropertyMap::new(),
            children: Vec::new(),
            visible: true,
            locked: false,
        }
    }

    pub fn with_content(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.content.insert(String::from(key), value.into());
        self
    }

    pub fn with_style(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.style.insert(String::from(key), value.into());
        self
    }

    pub fn with_child(mut self, child: Component) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Ids of direct children, in order
    pub fn child_ids(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.id.as_str()).collect()
    }

    /// Copy of this node with its children removed
    pub fn detached(&self) -> Component {
        Component {
            children: Vec::new(),
            ..self.clone()
        }
    }
}

/// Ordered forest of root-level components
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    roots: Vec<Component>,
}

impl From<Vec<Component>> for Snapshot {
    fn from(roots: Vec<Component>) -> Self {
        Self { roots }
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> &[Component] {
        &self.roots
    }

    pub fn roots_mut(&mut self) -> &mut Vec<Component> {
        &mut self.roots
    }

    /// Append a root-level component
    pub fn push(&mut self, component: Component) {
        self.roots.push(component);
    }

    /// Ids of root-level components, in order
    pub fn root_ids(&self) -> Vec<&str> {
        self.roots.iter().map(|c| c.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total node count, nested children included
    pub fn node_count(&self) -> usize {
        walk(self).len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Depth-first search by id
    pub fn find(&self, id: &str) -> Option<&Component> {
        find_in(&self.roots, id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Component> {
        find_in_mut(&mut self.roots, id)
    }

    /// Id of the component containing `id`; `None` for roots and unknown ids
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        walk(self)
            .into_iter()
            .find(|n| n.node.id == id)
            .and_then(|n| n.parent)
    }

    /// Detach and return the subtree rooted at `id`
    pub fn remove(&mut self, id: &str) -> Option<Component> {
        remove_in(&mut self.roots, id)
    }
}

fn find_in<'a>(nodes: &'a [Component], id: &str) -> Option<&'a Component> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_in(&node.children, id) {
            return Some(found);
        }
    }
    None
}

fn find_in_mut<'a>(nodes: &'a mut [Component], id: &str) -> Option<&'a mut Component> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_in_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

fn remove_in(nodes: &mut Vec<Component>, id: &str) -> Option<Component> {
    if let Some(pos) = nodes.iter().position(|n| n.id == id) {
        return Some(nodes.remove(pos));
    }
    nodes
        .iter_mut()
        .find_map(|node| remove_in(&mut node.children, id))
}

// ── Flattening ────────────────────────────────────────────────────────

/// A node visited by [`walk`], with the id of the node that contains it
#[derive(Debug, Clone, Copy)]
pub struct FlatNode<'a> {
    pub parent: Option<&'a str>,
    pub node: &'a Component,
}

/// Depth-first pre-order traversal of every node in the snapshot
pub fn walk(snapshot: &Snapshot) -> Vec<FlatNode<'_>> {
    let mut out = Vec::new();
    let mut stack: Vec<FlatNode<'_>> = snapshot
        .roots
        .iter()
        .rev()
        .map(|node| FlatNode { parent: None, node })
        .collect();
    while let Some(entry) = stack.pop() {
        for child in entry.node.children.iter().rev() {
            stack.push(FlatNode {
                parent: Some(entry.node.id.as_str()),
                node: child,
            });
        }
        out.push(entry);
    }
    out
}

/// Id-keyed view of every node, nested children included.
///
/// Ids must be unique within a snapshot; on duplicates the last node
/// visited wins.
pub fn flatten(snapshot: &Snapshot) -> BTreeMap<&str, &Component> {
    walk(snapshot)
        .into_iter()
        .map(|n| (n.node.id.as_str(), n.node))
        .collect()
}

/// Independent copy of `snapshot`; mutating either never affects the other
pub fn deep_clone(snapshot: &Snapshot) -> Snapshot {
    snapshot.clone()
}

// ── Equality ──────────────────────────────────────────────────────────

/// Structural equality of two snapshots: roots compared in order, recursively
pub fn structural_equals(a: &Snapshot, b: &Snapshot) -> bool {
    forest_equals(&a.roots, &b.roots)
}

/// Structural equality of two components, children included (order-sensitive)
pub fn components_equal(a: &Component, b: &Component) -> bool {
    fields_equal(a, b) && forest_equals(&a.children, &b.children)
}

/// Equality of a node's own fields, ignoring its children
pub fn fields_equal(a: &Component, b: &Component) -> bool {
    a.id == b.id
        && a.component_type == b.component_type
        && a.name == b.name
        && a.visible == b.visible
        && a.locked == b.locked
        && maps_equal(&a.content, &b.content)
        && maps_equal(&a.style, &b.style)
}

/// Same key set and deep-equal value per key; key order is irrelevant
pub fn maps_equal(a: &PropertyMap, b: &PropertyMap) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| other == value))
}

fn forest_equals(a: &[Component], b: &[Component]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| components_equal(x, y))
}
