//! Mutation engine
//!
//! Applies structural edits to a [`Tree`]. Every operation validates its
//! input completely before it touches the tree, so a failed operation leaves
//! the tree exactly as it was. Successful operations stamp `last_modified` on
//! the affected node and return a [`ChangeRecord`] describing what happened.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::crypto::SecureString;
use crate::error::{CofferError, CofferResult};
use crate::models::icon::RECYCLE_BIN_ICON;
use crate::models::{
    Entry, EntryInfo, FieldValue, Group, GroupInfo, IconImage, Node, NodeId, NodeKind, Tree,
};

/// Title given to a recycle bin created on demand
pub const RECYCLE_BIN_TITLE: &str = "Recycle Bin";

/// How `delete` disposes of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Move the node into the recycle bin
    SoftDelete,
    /// Remove the node and its descendants for good
    HardDelete,
}

/// A structural edit requested by a collaborator
#[derive(Debug, Clone)]
pub enum Operation {
    CreateGroup { parent: NodeId, info: GroupInfo },
    UpdateGroup { id: NodeId, info: GroupInfo },
    CreateEntry { parent: NodeId, info: EntryInfo },
    UpdateEntry { id: NodeId, info: EntryInfo },
    Reparent { node: NodeId, new_parent: NodeId },
    Delete { node: NodeId, policy: DeletePolicy },
    Restore { node: NodeId },
}

impl Operation {
    /// Short stable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateGroup { .. } => "create_group",
            Self::UpdateGroup { .. } => "update_group",
            Self::CreateEntry { .. } => "create_entry",
            Self::UpdateEntry { .. } => "update_entry",
            Self::Reparent { .. } => "reparent",
            Self::Delete { .. } => "delete",
            Self::Restore { .. } => "restore",
        }
    }
}

/// What an applied operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Moved,
    /// Soft-deleted into the recycle bin
    Trashed,
    /// Removed permanently
    Deleted,
    Restored,
}

/// Result of a successful operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub action: ChangeAction,
    pub node: NodeId,
    pub kind: NodeKind,
    pub title: String,
    /// Parent after the operation; `None` once a node is gone
    pub parent: Option<NodeId>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeRecord {
    fn new(action: ChangeAction, node: &Node) -> Self {
        Self {
            action,
            node: node.id(),
            kind: node.kind(),
            title: node.title().to_string(),
            parent: node.parent(),
            timestamp: Utc::now(),
        }
    }
}

/// Applies operations to a tree under a session's policy
pub struct MutationEngine<'a> {
    config: &'a SessionConfig,
}

impl<'a> MutationEngine<'a> {
    /// Create an engine bound to a configuration
    pub fn new(config: &'a SessionConfig) -> Self {
        Self { config }
    }

    /// Apply any operation
    pub fn apply(&self, tree: &mut Tree, operation: Operation) -> CofferResult<ChangeRecord> {
        let name = operation.name();
        let record = match operation {
            Operation::CreateGroup { parent, info } => self.create_group(tree, parent, info),
            Operation::UpdateGroup { id, info } => self.update_group(tree, id, info),
            Operation::CreateEntry { parent, info } => self.create_entry(tree, parent, info),
            Operation::UpdateEntry { id, info } => self.update_entry(tree, id, info),
            Operation::Reparent { node, new_parent } => self.reparent(tree, node, new_parent),
            Operation::Delete { node, policy } => self.delete(tree, node, policy),
            Operation::Restore { node } => self.restore(tree, node),
        }?;
        debug!(operation = name, node = %record.node, "Applied operation");
        Ok(record)
    }

    // === Groups ===

    /// Create a group as the last child of `parent`
    pub fn create_group(&self, tree: &mut Tree, parent: NodeId, info: GroupInfo) -> CofferResult<ChangeRecord> {
        self.check_new_parent(tree, parent)?;
        check_icon(&info.icon)?;

        let mut group = Group::new(Some(parent), info.title);
        group.base.notes = info.notes;
        group.base.icon = info.icon;
        group.base.expiry = info.expiry;

        let node = Node::Group(group);
        let record = ChangeRecord::new(ChangeAction::Created, &node);
        tree.attach(node)?;
        Ok(record)
    }

    /// Overwrite a group's title, notes, icon and expiry
    pub fn update_group(&self, tree: &mut Tree, id: NodeId, info: GroupInfo) -> CofferResult<ChangeRecord> {
        check_icon(&info.icon)?;
        let group = tree
            .group_mut(id)
            .ok_or_else(|| CofferError::group_not_found(id.to_string()))?;

        group.base.title = info.title;
        group.base.notes = info.notes;
        group.base.icon = info.icon;
        group.base.expiry = info.expiry;
        group.base.touch();

        record_for(tree, ChangeAction::Updated, id)
    }

    // === Entries ===

    /// Create an entry as the last child of `parent`
    pub fn create_entry(&self, tree: &mut Tree, parent: NodeId, info: EntryInfo) -> CofferResult<ChangeRecord> {
        self.check_new_parent(tree, parent)?;
        check_icon(&info.icon)?;
        let fields = self.build_fields(info.fields)?;

        let mut entry = Entry::new(parent, info.title);
        entry.base.notes = info.notes;
        entry.base.icon = info.icon;
        entry.base.expiry = info.expiry;
        entry.fields = fields;

        let node = Node::Entry(entry);
        let record = ChangeRecord::new(ChangeAction::Created, &node);
        tree.attach(node)?;
        Ok(record)
    }

    /// Replace an entry's contents, keeping its prior state in history
    pub fn update_entry(&self, tree: &mut Tree, id: NodeId, info: EntryInfo) -> CofferResult<ChangeRecord> {
        check_icon(&info.icon)?;
        let fields = self.build_fields(info.fields)?;
        let limit = self.config.history_max_items;

        let entry = tree
            .entry_mut(id)
            .ok_or_else(|| CofferError::entry_not_found(id.to_string()))?;

        if limit > 0 {
            let snapshot = entry.snapshot();
            entry.history.push(snapshot);
        }
        let excess = entry.history.len().saturating_sub(limit);
        entry.history.drain(..excess);

        entry.base.title = info.title;
        entry.base.notes = info.notes;
        entry.base.icon = info.icon;
        entry.base.expiry = info.expiry;
        entry.fields = fields;
        entry.base.touch();

        record_for(tree, ChangeAction::Updated, id)
    }

    // === Structure ===

    /// Move a node to the end of another group's children
    pub fn reparent(&self, tree: &mut Tree, node: NodeId, new_parent: NodeId) -> CofferResult<ChangeRecord> {
        if node == tree.root_id() {
            return Err(CofferError::Structure("The root group cannot be moved".into()));
        }
        if !tree.contains(node) {
            return Err(CofferError::node_not_found(node.to_string()));
        }
        if new_parent == node || tree.is_descendant(node, new_parent) {
            return Err(CofferError::CycleDetected {
                node: node.to_string(),
                new_parent: new_parent.to_string(),
            });
        }
        if tree.group(new_parent).is_none() {
            return Err(CofferError::ParentNotFound(new_parent.to_string()));
        }
        if Some(node) == tree.recycle_bin_id() {
            return Err(CofferError::Structure("The recycle bin cannot be moved".into()));
        }

        let was_trashed = tree.is_in_recycle_bin(node);
        let into_bin = tree.is_in_recycle_bin(new_parent);
        let old_parent = relink(tree, node, new_parent)?;

        let base = node_mut(tree, node)?.base_mut();
        match (was_trashed, into_bin) {
            (false, true) => {
                base.deleted_at = Some(Utc::now());
                base.previous_parent = old_parent;
            }
            (true, false) => {
                base.deleted_at = None;
                base.previous_parent = None;
            }
            _ => {}
        }
        base.touch();

        record_for(tree, ChangeAction::Moved, node)
    }

    /// Delete a node according to `policy`
    pub fn delete(&self, tree: &mut Tree, node: NodeId, policy: DeletePolicy) -> CofferResult<ChangeRecord> {
        if node == tree.root_id() {
            return Err(CofferError::Structure("The root group cannot be deleted".into()));
        }
        if !tree.contains(node) {
            return Err(CofferError::node_not_found(node.to_string()));
        }
        match policy {
            DeletePolicy::SoftDelete => self.soft_delete(tree, node),
            DeletePolicy::HardDelete => hard_delete(tree, node),
        }
    }

    /// Move a soft-deleted node back where it came from
    ///
    /// Falls back to the root when the previous parent no longer exists or
    /// is itself in the recycle bin.
    pub fn restore(&self, tree: &mut Tree, node: NodeId) -> CofferResult<ChangeRecord> {
        let current = tree
            .get(node)
            .ok_or_else(|| CofferError::node_not_found(node.to_string()))?;
        if current.base().deleted_at.is_none() || !tree.is_in_recycle_bin(node) {
            return Err(CofferError::RecycleBin(format!("{} is not in the recycle bin", node)));
        }

        let target = current
            .base()
            .previous_parent
            .filter(|p| tree.group(*p).is_some() && !tree.is_in_recycle_bin(*p))
            .unwrap_or_else(|| tree.root_id());

        relink(tree, node, target)?;
        let base = node_mut(tree, node)?.base_mut();
        base.deleted_at = None;
        base.previous_parent = None;
        base.touch();

        record_for(tree, ChangeAction::Restored, node)
    }

    fn soft_delete(&self, tree: &mut Tree, node: NodeId) -> CofferResult<ChangeRecord> {
        if !self.config.recycle_bin_enabled {
            return Err(CofferError::RecycleBin("the recycle bin is disabled".into()));
        }
        if tree.is_in_recycle_bin(node) {
            return Err(CofferError::RecycleBin(format!(
                "{} is already in the recycle bin",
                node
            )));
        }

        let bin = ensure_recycle_bin(tree)?;
        // A bin loaded below other groups must not swallow its own ancestor
        if tree.is_descendant(node, bin) {
            return Err(CofferError::CycleDetected {
                node: node.to_string(),
                new_parent: bin.to_string(),
            });
        }
        let old_parent = relink(tree, node, bin)?;
        let base = node_mut(tree, node)?.base_mut();
        base.deleted_at = Some(Utc::now());
        base.previous_parent = old_parent;
        base.touch();

        record_for(tree, ChangeAction::Trashed, node)
    }

    // === Validation ===

    fn check_new_parent(&self, tree: &Tree, parent: NodeId) -> CofferResult<()> {
        if tree.group(parent).is_none() {
            return Err(CofferError::ParentNotFound(parent.to_string()));
        }
        if tree.is_in_recycle_bin(parent) && !self.config.allow_create_in_recycle_bin {
            return Err(CofferError::InRecycleBin(parent.to_string()));
        }
        Ok(())
    }

    fn build_fields(&self, fields: Vec<(String, FieldValue)>) -> CofferResult<BTreeMap<String, FieldValue>> {
        let mut map = BTreeMap::new();
        for (name, value) in fields {
            if name.trim().is_empty() {
                return Err(CofferError::Validation("Field name cannot be empty".into()));
            }
            if map.contains_key(&name) {
                return Err(CofferError::DuplicateField(name));
            }
            let value = if self.config.is_protected_field(&name) {
                value.into_protected()
            } else {
                value
            };
            map.insert(name, value);
        }
        Ok(map)
    }
}

fn check_icon(icon: &IconImage) -> CofferResult<()> {
    if icon.is_valid() {
        Ok(())
    } else {
        Err(CofferError::Validation(format!("Unknown icon {}", icon)))
    }
}

fn node_mut(tree: &mut Tree, id: NodeId) -> CofferResult<&mut Node> {
    tree.node_mut(id)
        .ok_or_else(|| CofferError::node_not_found(id.to_string()))
}

fn record_for(tree: &Tree, action: ChangeAction, id: NodeId) -> CofferResult<ChangeRecord> {
    tree.get(id)
        .map(|node| ChangeRecord::new(action, node))
        .ok_or_else(|| CofferError::node_not_found(id.to_string()))
}

/// Detach `node` from its parent and append it to `new_parent`; returns the old parent
fn relink(tree: &mut Tree, node: NodeId, new_parent: NodeId) -> CofferResult<Option<NodeId>> {
    tree.unlink(node);
    let old_parent = node_mut(tree, node)?.base_mut().parent.replace(new_parent);
    tree.group_mut(new_parent)
        .ok_or_else(|| CofferError::ParentNotFound(new_parent.to_string()))?
        .children
        .push(node);
    Ok(old_parent)
}

fn ensure_recycle_bin(tree: &mut Tree) -> CofferResult<NodeId> {
    if let Some(bin) = tree.recycle_bin_id() {
        return Ok(bin);
    }
    let mut bin = Group::new(Some(tree.root_id()), RECYCLE_BIN_TITLE);
    bin.base.icon = IconImage::Standard(RECYCLE_BIN_ICON);
    bin.recycle_bin = true;
    let id = tree.attach(Node::Group(bin))?;
    tree.set_recycle_bin(id);
    info!(bin = %id, "Created recycle bin");
    Ok(id)
}

/// Remove a subtree and release the secrets nothing else still references
fn hard_delete(tree: &mut Tree, node: NodeId) -> CofferResult<ChangeRecord> {
    let mut record = record_for(tree, ChangeAction::Deleted, node)?;
    record.parent = None;

    let doomed = tree.subtree(node);
    tree.unlink(node);
    let removed: Vec<Node> = doomed.into_iter().filter_map(|id| tree.take(id)).collect();

    let survivors: HashSet<*const SecureString> = tree
        .iter()
        .filter_map(Node::as_entry)
        .flat_map(Entry::protected_values)
        .map(Arc::as_ptr)
        .collect();
    let mut released = 0usize;
    for secret in removed
        .iter()
        .filter_map(Node::as_entry)
        .flat_map(Entry::protected_values)
    {
        if !survivors.contains(&Arc::as_ptr(secret)) && !secret.is_released() {
            secret.release();
            released += 1;
        }
    }

    info!(node = %node, removed = removed.len(), released, "Deleted subtree");
    Ok(record)
}
