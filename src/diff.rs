//! Change detection between snapshots
//!
//! Produces discrete, typed change records: creations, deletions,
//! whole-map content/style replacements, scalar field updates and a
//! root-order change. Records can be replayed with [`apply_changes`].
//!
//! # Record order
//!
//! 1. `Delete` for every id only in `previous` (depth-first order of `previous`)
//! 2. `Create` for every id only in `current` (depth-first order of `current`)
//! 3. Per shared id, ascending by id: `Content`, `Style`, then `Update`
//!    records for `type`, `name`, `visible`, `locked`, `children`
//! 4. `Reorder` last, when the root id sequence differs
//!
//! Author: Moroya Sakamoto

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::tree::{flatten, maps_equal, walk, Component, ComponentId, PropertyMap, Snapshot};

/// Field path of the child-sequence update on a parent component
pub const CHILDREN_FIELD: &str = "children";

/// Kind of change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Delete,
    /// Scalar field change, see `field_path`
    Update,
    /// `content` map replaced
    Content,
    /// `style` map replaced
    Style,
    /// Root-level ordering changed
    Reorder,
}

/// Before/after payload of a change record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ChangeValue {
    /// Whole component, children included
    Component(Box<Component>),
    Properties(PropertyMap),
    Scalar(Value),
    /// Ordered id sequence
    Ids(Vec<ComponentId>),
}

/// One discrete difference between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: String,
    pub kind: ChangeKind,
    /// Absent for `Reorder`
    pub component_id: Option<ComponentId>,
    pub before: Option<ChangeValue>,
    pub after: Option<ChangeValue>,
    /// Changed field for `Update` records
    pub field_path: Option<String>,
    pub description: String,
}

impl ChangeRecord {
    fn new(kind: ChangeKind, component_id: Option<&str>, description: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            component_id: component_id.map(String::from),
            before: None,
            after: None,
            field_path: None,
            description,
        }
    }

    fn with_values(mut self, before: Option<ChangeValue>, after: Option<ChangeValue>) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field_path = Some(String::from(field));
        self
    }
}

/// Compute the change records that turn `previous` into `current`
pub fn detect_changes(previous: &Snapshot, current: &Snapshot) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();
    let prev_map = flatten(previous);
    let curr_map = flatten(current);

    for entry in walk(previous) {
        let node = entry.node;
        if !curr_map.contains_key(node.id.as_str()) {
            changes.push(
                ChangeRecord::new(
                    ChangeKind::Delete,
                    Some(node.id.as_str()),
                    format!("Deleted {} \"{}\"", node.component_type, node.name),
                )
                .with_values(Some(ChangeValue::Component(Box::new(node.clone()))), None),
            );
        }
    }

    for entry in walk(current) {
        let node = entry.node;
        if !prev_map.contains_key(node.id.as_str()) {
            changes.push(
                ChangeRecord::new(
                    ChangeKind::Create,
                    Some(node.id.as_str()),
                    format!("Created {} \"{}\"", node.component_type, node.name),
                )
                .with_values(None, Some(ChangeValue::Component(Box::new(node.clone())))),
            );
        }
    }

    for (id, before) in &prev_map {
        if let Some(after) = curr_map.get(id) {
            diff_component(before, after, &mut changes);
        }
    }

    let prev_roots = previous.root_ids();
    let curr_roots = current.root_ids();
    if prev_roots != curr_roots {
        changes.push(
            ChangeRecord::new(
                ChangeKind::Reorder,
                None,
                String::from("Reordered root components"),
            )
            .with_values(Some(ids_value(&prev_roots)), Some(ids_value(&curr_roots))),
        );
    }

    debug!(
        "detected {} change(s) across {} -> {} component(s)",
        changes.len(),
        prev_map.len(),
        curr_map.len()
    );
    changes
}

fn diff_component(before: &Component, after: &Component, changes: &mut Vec<ChangeRecord>) {
    let id = before.id.as_str();

    if !maps_equal(&before.content, &after.content) {
        changes.push(
            ChangeRecord::new(
                ChangeKind::Content,
                Some(id),
                format!("Changed content of \"{}\"", after.name),
            )
            .with_values(
                Some(ChangeValue::Properties(before.content.clone())),
                Some(ChangeValue::Properties(after.content.clone())),
            ),
        );
    }

    if !maps_equal(&before.style, &after.style) {
        changes.push(
            ChangeRecord::new(
                ChangeKind::Style,
                Some(id),
                format!("Changed style of \"{}\"", after.name),
            )
            .with_values(
                Some(ChangeValue::Properties(before.style.clone())),
                Some(ChangeValue::Properties(after.style.clone())),
            ),
        );
    }

    let scalars = [
        (
            "type",
            Value::from(before.component_type.as_str()),
            Value::from(after.component_type.as_str()),
        ),
        (
            "name",
            Value::from(before.name.as_str()),
            Value::from(after.name.as_str()),
        ),
        ("visible", Value::from(before.visible), Value::from(after.visible)),
        ("locked", Value::from(before.locked), Value::from(after.locked)),
    ];
    for (field, old, new) in scalars {
        if old != new {
            changes.push(
                ChangeRecord::new(
                    ChangeKind::Update,
                    Some(id),
                    format!("Changed {field} of \"{}\" from {old} to {new}", after.name),
                )
                .with_field(field)
                .with_values(Some(ChangeValue::Scalar(old)), Some(ChangeValue::Scalar(new))),
            );
        }
    }

    let old_children = before.child_ids();
    let new_children = after.child_ids();
    if old_children != new_children {
        changes.push(
            ChangeRecord::new(
                ChangeKind::Update,
                Some(id),
                format!("Changed children of \"{}\"", after.name),
            )
            .with_field(CHILDREN_FIELD)
            .with_values(Some(ids_value(&old_children)), Some(ids_value(&new_children))),
        );
    }
}

fn ids_value(ids: &[&str]) -> ChangeValue {
    ChangeValue::Ids(ids.iter().map(|id| String::from(*id)).collect())
}

// ── Replay ────────────────────────────────────────────────────────────

/// Replay change records onto a copy of `snapshot`.
///
/// Records that reference unknown components or carry an unexpected
/// payload are skipped. Replaying `detect_changes(a, b)` onto `a`
/// yields a snapshot structurally equal to `b`.
pub fn apply_changes(snapshot: &Snapshot, changes: &[ChangeRecord]) -> Snapshot {
    let mut nodes: BTreeMap<ComponentId, Component> = BTreeMap::new();
    let mut children: BTreeMap<ComponentId, Vec<ComponentId>> = BTreeMap::new();
    for entry in walk(snapshot) {
        nodes.insert(entry.node.id.clone(), entry.node.detached());
        children.insert(entry.node.id.clone(), owned_ids(&entry.node.child_ids()));
    }
    let mut roots = owned_ids(&snapshot.root_ids());

    for change in changes {
        let target = change.component_id.as_deref();
        match (change.kind, target, change.after.as_ref()) {
            (ChangeKind::Delete, Some(id), _) => {
                nodes.remove(id);
                children.remove(id);
            }
            (ChangeKind::Create, _, Some(ChangeValue::Component(component))) => {
                children.insert(component.id.clone(), owned_ids(&component.child_ids()));
                nodes.insert(component.id.clone(), component.detached());
            }
            (ChangeKind::Content, Some(id), Some(ChangeValue::Properties(map))) => {
                if let Some(node) = nodes.get_mut(id) {
                    node.content = map.clone();
                }
            }
            (ChangeKind::Style, Some(id), Some(ChangeValue::Properties(map))) => {
                if let Some(node) = nodes.get_mut(id) {
                    node.style = map.clone();
                }
            }
            (ChangeKind::Update, Some(id), Some(value)) => {
                apply_update(
                    id,
                    change.field_path.as_deref(),
                    value,
                    &mut nodes,
                    &mut children,
                );
            }
            (ChangeKind::Reorder, _, Some(ChangeValue::Ids(ids))) => {
                roots = ids.clone();
            }
            _ => {}
        }
    }

    let mut placed = BTreeSet::new();
    let assembled = roots
        .iter()
        .filter_map(|id| assemble(id, &nodes, &children, &mut placed))
        .collect::<Vec<_>>();
    Snapshot::from(assembled)
}

fn apply_update(
    id: &str,
    field: Option<&str>,
    value: &ChangeValue,
    nodes: &mut BTreeMap<ComponentId, Component>,
    children: &mut BTreeMap<ComponentId, Vec<ComponentId>>,
) {
    if let (Some(CHILDREN_FIELD), ChangeValue::Ids(ids)) = (field, value) {
        if nodes.contains_key(id) {
            children.insert(String::from(id), ids.clone());
        }
        return;
    }
    let (Some(node), ChangeValue::Scalar(scalar)) = (nodes.get_mut(id), value) else {
        return;
    };
    match (field, scalar) {
        (Some("type"), Value::String(s)) => node.component_type = s.clone(),
        (Some("name"), Value::String(s)) => node.name = s.clone(),
        (Some("visible"), Value::Bool(b)) => node.visible = *b,
        (Some("locked"), Value::Bool(b)) => node.locked = *b,
        _ => {}
    }
}

fn assemble(
    id: &str,
    nodes: &BTreeMap<ComponentId, Component>,
    children: &BTreeMap<ComponentId, Vec<ComponentId>>,
    placed: &mut BTreeSet<ComponentId>,
) -> Option<Component> {
    let mut node = nodes.get(id)?.clone();
    // A node may appear only once; guards against cyclic child lists.
    if !placed.insert(String::from(id)) {
        return None;
    }
    if let Some(child_ids) = children.get(id) {
        node.children = child_ids
            .iter()
            .filter_map(|child| assemble(child, nodes, children, placed))
            .collect();
    }
    Some(node)
}

fn owned_ids(ids: &[&str]) -> Vec<ComponentId> {
    ids.iter().map(|id| String::from(*id)).collect()
}
