//! Group and Entry nodes
//!
//! Both node kinds share a [`NodeBase`]. Groups own an ordered list of child
//! ids; entries own named fields and a bounded history of earlier states.
//! Nodes are plain data: all structural changes go through the mutation
//! engine so the tree invariants are checked in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::crypto::SecureString;

use super::expiry::Expiry;
use super::field::{FieldValue, USERNAME_FIELD};
use super::icon::IconImage;
use super::ids::NodeId;

/// Fields common to groups and entries
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBase {
    /// Unique identifier, immutable after creation
    pub id: NodeId,

    /// Owning group; `None` only for the root
    pub parent: Option<NodeId>,

    /// Display title
    pub title: String,

    /// Icon reference
    pub icon: IconImage,

    /// Notes; `Some("")` is kept distinct from `None`
    pub notes: Option<String>,

    /// Expiry settings
    pub expiry: Expiry,

    /// When the node was created
    pub created_at: DateTime<Utc>,

    /// When any field of the node last changed
    pub last_modified: DateTime<Utc>,

    /// Set when the node was moved to the recycle bin
    pub deleted_at: Option<DateTime<Utc>>,

    /// Where the node lived before it was moved to the recycle bin
    pub previous_parent: Option<NodeId>,
}

impl NodeBase {
    pub(crate) fn new(parent: Option<NodeId>, title: impl Into<String>, icon: IconImage) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::new(),
            parent,
            title: title.into(),
            icon,
            notes: None,
            expiry: Expiry::never(),
            created_at: now,
            last_modified: now,
            deleted_at: None,
            previous_parent: None,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

/// Container node, analogous to a folder
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub base: NodeBase,

    /// Child ids in display order
    pub children: Vec<NodeId>,

    /// Whether this group is the recycle bin
    pub recycle_bin: bool,
}

impl Group {
    pub(crate) fn new(parent: Option<NodeId>, title: impl Into<String>) -> Self {
        Self {
            base: NodeBase::new(parent, title, IconImage::group_default()),
            children: Vec::new(),
            recycle_bin: false,
        }
    }

    /// Number of direct children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// A prior state of an entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub title: String,
    pub icon: IconImage,
    pub notes: Option<String>,
    pub expiry: Expiry,
    pub fields: BTreeMap<String, FieldValue>,
    pub last_modified: DateTime<Utc>,
}

/// Leaf node holding named fields
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub base: NodeBase,

    /// Fields keyed by name
    pub fields: BTreeMap<String, FieldValue>,

    /// Earlier states, oldest first
    pub history: Vec<EntrySnapshot>,
}

impl Entry {
    pub(crate) fn new(parent: NodeId, title: impl Into<String>) -> Self {
        Self {
            base: NodeBase::new(Some(parent), title, IconImage::entry_default()),
            fields: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// Look up a field
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Plain-text user name, if present
    pub fn username(&self) -> Option<&str> {
        self.field(USERNAME_FIELD).and_then(FieldValue::as_plain)
    }

    pub(crate) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            title: self.base.title.clone(),
            icon: self.base.icon,
            notes: self.base.notes.clone(),
            expiry: self.base.expiry,
            fields: self.fields.clone(),
            last_modified: self.base.last_modified,
        }
    }

    /// Every protected value held by this entry and its history
    pub(crate) fn protected_values(&self) -> impl Iterator<Item = &Arc<SecureString>> {
        let history = self.history.iter().flat_map(|s| s.fields.values());
        self.fields.values().chain(history).filter_map(|value| match value {
            FieldValue::Protected(secret) => Some(secret),
            FieldValue::Plain(_) => None,
        })
    }
}

/// Node kind, serialized by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Group,
    Entry,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Group => write!(f, "Group"),
            NodeKind::Entry => write!(f, "Entry"),
        }
    }
}

/// A node of the database tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group(Group),
    Entry(Entry),
}

impl Node {
    /// Shared fields
    pub fn base(&self) -> &NodeBase {
        match self {
            Node::Group(g) => &g.base,
            Node::Entry(e) => &e.base,
        }
    }

    pub(crate) fn base_mut(&mut self) -> &mut NodeBase {
        match self {
            Node::Group(g) => &mut g.base,
            Node::Entry(e) => &mut e.base,
        }
    }

    pub fn id(&self) -> NodeId {
        self.base().id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.base().parent
    }

    pub fn title(&self) -> &str {
        &self.base().title
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Group(_) => NodeKind::Group,
            Node::Entry(_) => NodeKind::Entry,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Group(g) => Some(g),
            Node::Entry(_) => None,
        }
    }

    pub fn as_entry(&self) -> Option<&Entry> {
        match self {
            Node::Entry(e) => Some(e),
            Node::Group(_) => None,
        }
    }

    pub(crate) fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Node::Group(g) => Some(g),
            Node::Entry(_) => None,
        }
    }

    pub(crate) fn as_entry_mut(&mut self) -> Option<&mut Entry> {
        match self {
            Node::Entry(e) => Some(e),
            Node::Group(_) => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::PASSWORD_FIELD;

    #[test]
    fn test_new_group() {
        let group = Group::new(None, "Root");
        assert_eq!(group.base.title, "Root");
        assert_eq!(group.child_count(), 0);
        assert!(!group.recycle_bin);
        assert_eq!(group.base.icon, IconImage::group_default());
    }

    #[test]
    fn test_entry_accessors() {
        let mut entry = Entry::new(NodeId::new(), "Email");
        entry
            .fields
            .insert(USERNAME_FIELD.into(), FieldValue::plain("alice"));
        entry
            .fields
            .insert(PASSWORD_FIELD.into(), FieldValue::protected("x"));
        assert_eq!(entry.username(), Some("alice"));
        assert!(entry.field(PASSWORD_FIELD).unwrap().is_protected());
    }

    #[test]
    fn test_protected_values_cover_history() {
        let mut entry = Entry::new(NodeId::new(), "Email");
        entry
            .fields
            .insert(PASSWORD_FIELD.into(), FieldValue::protected("old"));
        entry.history.push(entry.snapshot());
        entry
            .fields
            .insert(PASSWORD_FIELD.into(), FieldValue::protected("new"));

        entry
            .fields
            .insert(USERNAME_FIELD.into(), FieldValue::plain("alice"));

        let revealed: Vec<String> = entry
            .protected_values()
            .map(|s| s.reveal().unwrap().to_string())
            .collect();
        assert_eq!(revealed, vec!["new".to_string(), "old".to_string()]);
    }

    #[test]
    fn test_node_kind_display() {
        let node = Node::Group(Group::new(None, "Root"));
        assert_eq!(node.kind(), NodeKind::Group);
        assert_eq!(node.kind().to_string(), "Group");
        assert!(node.as_entry().is_none());
    }
}
