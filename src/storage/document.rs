//! Serialized form of the tree
//!
//! The document lists nodes in pre-order. Each record names its parent and,
//! for groups, its ordered children, so loading rebuilds exactly the stored
//! order. Protected values are sealed one by one with the database key, so
//! the document itself never holds a secret in the clear.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{decrypt, encrypt, DerivedKey, EncryptedData, SecureString};
use crate::error::{CofferError, CofferResult};
use crate::models::{
    Entry, EntrySnapshot, Expiry, FieldValue, Group, IconImage, Node, NodeBase, NodeId, NodeKind,
    Tree,
};

/// A stored field value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StoredValue {
    Plain { value: String },
    Protected { sealed: EncryptedData },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FieldRecord {
    name: String,
    #[serde(flatten)]
    value: StoredValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotRecord {
    title: String,
    icon: IconImage,
    #[serde(default)]
    notes: Option<String>,
    expiry: Expiry,
    #[serde(default)]
    fields: Vec<FieldRecord>,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeRecord {
    id: NodeId,
    kind: NodeKind,
    #[serde(default)]
    parent: Option<NodeId>,
    title: String,
    icon: IconImage,
    #[serde(default)]
    notes: Option<String>,
    expiry: Expiry,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    recycle_bin: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    history: Vec<SnapshotRecord>,
}

/// The decrypted database payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeDocument {
    root: NodeId,
    nodes: Vec<NodeRecord>,
}

impl TreeDocument {
    /// Serialize a tree, sealing protected values with `key`
    pub fn from_tree(tree: &Tree, key: &DerivedKey) -> CofferResult<Self> {
        let nodes = tree
            .subtree(tree.root_id())
            .into_iter()
            .filter_map(|id| tree.get(id))
            .map(|node| node_record(node, key))
            .collect::<CofferResult<Vec<_>>>()?;
        Ok(Self {
            root: tree.root_id(),
            nodes,
        })
    }

    /// Number of stored nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Rebuild the tree, unsealing protected values with `key`
    ///
    /// Fails with a structural error when the stored nodes break any tree
    /// invariant.
    pub fn into_tree(self, key: &DerivedKey) -> CofferResult<Tree> {
        let nodes = self
            .nodes
            .into_iter()
            .map(|record| node_from_record(record, key))
            .collect::<CofferResult<Vec<_>>>()?;
        Tree::from_nodes(self.root, nodes)
    }
}

fn seal_fields(fields: &BTreeMap<String, FieldValue>, key: &DerivedKey) -> CofferResult<Vec<FieldRecord>> {
    fields
        .iter()
        .map(|(name, value)| {
            let value = match value {
                FieldValue::Plain(text) => StoredValue::Plain {
                    value: text.clone(),
                },
                FieldValue::Protected(secret) => StoredValue::Protected {
                    sealed: secret.with_plaintext(|bytes| encrypt(bytes, key))??,
                },
            };
            Ok(FieldRecord {
                name: name.clone(),
                value,
            })
        })
        .collect()
}

fn unseal_fields(records: Vec<FieldRecord>, key: &DerivedKey) -> CofferResult<BTreeMap<String, FieldValue>> {
    let mut fields = BTreeMap::new();
    for record in records {
        let value = match record.value {
            StoredValue::Plain { value } => FieldValue::Plain(value),
            StoredValue::Protected { sealed } => {
                let plaintext = decrypt(&sealed, key)?;
                FieldValue::protected(SecureString::new(plaintext.to_vec()))
            }
        };
        if fields.insert(record.name.clone(), value).is_some() {
            return Err(CofferError::DuplicateField(record.name));
        }
    }
    Ok(fields)
}

fn node_record(node: &Node, key: &DerivedKey) -> CofferResult<NodeRecord> {
    let base = node.base();
    let mut record = NodeRecord {
        id: base.id,
        kind: node.kind(),
        parent: base.parent,
        title: base.title.clone(),
        icon: base.icon,
        notes: base.notes.clone(),
        expiry: base.expiry,
        created_at: base.created_at,
        last_modified: base.last_modified,
        deleted_at: base.deleted_at,
        previous_parent: base.previous_parent,
        children: Vec::new(),
        recycle_bin: false,
        fields: Vec::new(),
        history: Vec::new(),
    };
    match node {
        Node::Group(group) => {
            record.children = group.children.clone();
            record.recycle_bin = group.recycle_bin;
        }
        Node::Entry(entry) => {
            record.fields = seal_fields(&entry.fields, key)?;
            record.history = entry
                .history
                .iter()
                .map(|snapshot| {
                    Ok(SnapshotRecord {
                        title: snapshot.title.clone(),
                        icon: snapshot.icon,
                        notes: snapshot.notes.clone(),
                        expiry: snapshot.expiry,
                        fields: seal_fields(&snapshot.fields, key)?,
                        last_modified: snapshot.last_modified,
                    })
                })
                .collect::<CofferResult<Vec<_>>>()?;
        }
    }
    Ok(record)
}

fn node_from_record(record: NodeRecord, key: &DerivedKey) -> CofferResult<Node> {
    let base = NodeBase {
        id: record.id,
        parent: record.parent,
        title: record.title,
        icon: record.icon,
        notes: record.notes,
        expiry: record.expiry,
        created_at: record.created_at,
        last_modified: record.last_modified,
        deleted_at: record.deleted_at,
        previous_parent: record.previous_parent,
    };
    match record.kind {
        NodeKind::Group => {
            if !record.fields.is_empty() || !record.history.is_empty() {
                return Err(CofferError::Structure(format!("Group {} has fields", base.id)));
            }
            Ok(Node::Group(Group {
                base,
                children: record.children,
                recycle_bin: record.recycle_bin,
            }))
        }
        NodeKind::Entry => {
            if !record.children.is_empty() || record.recycle_bin {
                return Err(CofferError::Structure(format!("Entry {} has children", base.id)));
            }
            let history = record
                .history
                .into_iter()
                .map(|snapshot| {
                    Ok(EntrySnapshot {
                        title: snapshot.title,
                        icon: snapshot.icon,
                        notes: snapshot.notes,
                        expiry: snapshot.expiry,
                        fields: unseal_fields(snapshot.fields, key)?,
                        last_modified: snapshot.last_modified,
                    })
                })
                .collect::<CofferResult<Vec<_>>>()?;
            Ok(Node::Entry(Entry {
                base,
                fields: unseal_fields(record.fields, key)?,
                history,
            }))
        }
    }
}
