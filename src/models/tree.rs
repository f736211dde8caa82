//! The database tree
//!
//! [`Tree`] stores every node by id and answers structural queries. Parent
//! back-references make ancestry checks O(depth). The tree has no public
//! mutators; the mutation engine edits it through crate-private helpers and
//! the session publishes the result as an immutable snapshot.

use std::collections::{HashMap, HashSet};

use crate::error::{CofferError, CofferResult};

use super::field::FieldValue;
use super::ids::NodeId;
use super::node::{Entry, Group, Node};
use super::sort::SortOptions;

/// Group/Entry hierarchy of one database
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    recycle_bin: Option<NodeId>,
}

impl Tree {
    /// A tree holding only a root group
    pub fn new(root_title: impl Into<String>) -> Self {
        let root = Group::new(None, root_title);
        let root_id = root.base.id;
        let mut nodes = HashMap::new();
        nodes.insert(root_id, Node::Group(root));
        Self {
            nodes,
            root: root_id,
            recycle_bin: None,
        }
    }

    /// Rebuild a tree from loaded nodes and check every invariant
    pub(crate) fn from_nodes(root: NodeId, nodes: Vec<Node>) -> CofferResult<Self> {
        let mut map = HashMap::with_capacity(nodes.len());
        for node in nodes {
            let id = node.id();
            if map.insert(id, node).is_some() {
                return Err(CofferError::Structure(format!("Duplicate node id {}", id)));
            }
        }
        let mut bins = map
            .values()
            .filter_map(Node::as_group)
            .filter(|g| g.recycle_bin)
            .map(|g| g.base.id);
        let recycle_bin = bins.next();
        if bins.next().is_some() {
            return Err(CofferError::Structure("More than one recycle bin".into()));
        }
        let tree = Self {
            nodes: map,
            root,
            recycle_bin,
        };
        tree.verify_invariants()?;
        Ok(tree)
    }

    /// Id of the root group
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// Id of the recycle bin group, if one exists
    pub fn recycle_bin_id(&self) -> Option<NodeId> {
        self.recycle_bin
    }

    /// Number of nodes including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Never true: a tree always has its root
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn group(&self, id: NodeId) -> Option<&Group> {
        self.get(id).and_then(Node::as_group)
    }

    pub fn entry(&self, id: NodeId) -> Option<&Entry> {
        self.get(id).and_then(Node::as_entry)
    }

    /// The root group
    pub fn root(&self) -> &Group {
        self.group(self.root)
            .unwrap_or_else(|| unreachable!("tree without root group"))
    }

    /// All nodes in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Ancestor ids, nearest parent first, ending with the root
    pub fn ancestors_of(&self, id: NodeId) -> CofferResult<Vec<NodeId>> {
        let node = self
            .get(id)
            .ok_or_else(|| CofferError::node_not_found(id.to_string()))?;
        let mut ancestors = Vec::new();
        let mut current = node.parent();
        while let Some(parent) = current {
            if ancestors.len() > self.nodes.len() {
                return Err(CofferError::Structure(format!("Cycle above {}", id)));
            }
            ancestors.push(parent);
            current = self.get(parent).and_then(Node::parent);
        }
        Ok(ancestors)
    }

    /// Whether `node` lies strictly below `candidate_ancestor`
    ///
    /// Walks parent links from `node`, so it costs O(depth).
    pub fn is_descendant(&self, candidate_ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.get(node).and_then(Node::parent);
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == candidate_ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            current = self.get(parent).and_then(Node::parent);
        }
        false
    }

    /// Direct children of a group in stored order
    pub fn children_of(&self, group_id: NodeId) -> CofferResult<Vec<&Node>> {
        let group = self
            .group(group_id)
            .ok_or_else(|| CofferError::group_not_found(group_id.to_string()))?;
        Ok(group
            .children
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect())
    }

    /// Direct children of a group in display order
    pub fn children_sorted(&self, group_id: NodeId, options: &SortOptions) -> CofferResult<Vec<&Node>> {
        let mut children = self.children_of(group_id)?;
        options.apply(&mut children);
        Ok(children)
    }

    /// Whether the node is the recycle bin or lies inside it
    pub fn is_in_recycle_bin(&self, id: NodeId) -> bool {
        match self.recycle_bin {
            Some(bin) => id == bin || self.is_descendant(bin, id),
            None => false,
        }
    }

    /// The node and all its descendants in pre-order
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            order.push(current);
            if let Some(group) = node.as_group() {
                stack.extend(group.children.iter().rev().copied());
            }
        }
        order
    }

    /// Slash-separated titles from the root's children down to `id`
    pub fn path_of(&self, id: NodeId) -> CofferResult<String> {
        let node = self
            .get(id)
            .ok_or_else(|| CofferError::node_not_found(id.to_string()))?;
        let mut parts: Vec<&str> = self
            .ancestors_of(id)?
            .iter()
            .rev()
            .skip(1)
            .filter_map(|a| self.get(*a).map(Node::title))
            .collect();
        if id != self.root {
            parts.push(node.title());
        }
        Ok(parts.join("/"))
    }

    /// Resolve a slash-separated title path; the empty path is the root
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let group = self.group(current)?;
            current = group
                .children
                .iter()
                .copied()
                .find(|c| self.get(*c).is_some_and(|n| n.title() == part))?;
        }
        Some(current)
    }

    /// Entries whose title, notes or plain fields contain `query`
    ///
    /// The recycle bin subtree is skipped and protected values are never read.
    pub fn search(&self, query: &str) -> Vec<&Entry> {
        let needle = query.to_lowercase();
        let matches = |text: &str| text.to_lowercase().contains(&needle);
        let mut found: Vec<&Entry> = self
            .nodes
            .values()
            .filter_map(Node::as_entry)
            .filter(|e| !self.is_in_recycle_bin(e.base.id))
            .filter(|e| {
                matches(&e.base.title)
                    || e.base.notes.as_deref().is_some_and(matches)
                    || e.fields.values().any(|v| match v {
                        FieldValue::Plain(s) => matches(s),
                        FieldValue::Protected(_) => false,
                    })
            })
            .collect();
        found.sort_by(|a, b| a.base.title.cmp(&b.base.title).then(a.base.id.cmp(&b.base.id)));
        found
    }

    /// Check every structural invariant of the tree
    pub fn verify_invariants(&self) -> CofferResult<()> {
        let broken = |msg: String| Err(CofferError::Structure(msg));

        match self.get(self.root) {
            Some(Node::Group(root)) if root.base.parent.is_none() => {}
            _ => return broken("Root must be a parentless group".into()),
        }

        for (id, node) in &self.nodes {
            if *id != node.id() {
                return broken(format!("Node stored under wrong id {}", id));
            }
            if *id == self.root {
                continue;
            }
            let Some(parent_id) = node.parent() else {
                return broken(format!("Node {} has no parent", id));
            };
            let Some(parent) = self.group(parent_id) else {
                return broken(format!("Parent {} of {} is not a group", parent_id, id));
            };
            let occurrences = parent.children.iter().filter(|c| *c == id).count();
            if occurrences != 1 {
                return broken(format!(
                    "Node {} appears {} times under its parent",
                    id, occurrences
                ));
            }
        }

        for group in self.nodes.values().filter_map(Node::as_group) {
            let mut seen = HashSet::new();
            for child in &group.children {
                if !seen.insert(*child) {
                    return broken(format!("Duplicate child {} in {}", child, group.base.id));
                }
                if self.get(*child).and_then(Node::parent) != Some(group.base.id) {
                    return broken(format!("Child {} does not point back to {}", child, group.base.id));
                }
            }
        }

        // Every node must reach the root without revisiting anything
        if self.subtree(self.root).len() != self.nodes.len() {
            return broken("Tree contains unreachable nodes or cycles".into());
        }

        if let Some(bin) = self.recycle_bin {
            if !self.group(bin).is_some_and(|g| g.recycle_bin) {
                return broken(format!("Recycle bin {} is not a flagged group", bin));
            }
        }

        Ok(())
    }

    // Crate-private helpers used by the mutation engine

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn group_mut(&mut self, id: NodeId) -> Option<&mut Group> {
        self.nodes.get_mut(&id).and_then(Node::as_group_mut)
    }

    pub(crate) fn entry_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
        self.nodes.get_mut(&id).and_then(Node::as_entry_mut)
    }

    /// Insert a node and append it to its parent's children
    pub(crate) fn attach(&mut self, node: Node) -> CofferResult<NodeId> {
        let id = node.id();
        let parent_id = node
            .parent()
            .ok_or_else(|| CofferError::Structure("Only the root may be parentless".into()))?;
        let parent = self
            .group_mut(parent_id)
            .ok_or_else(|| CofferError::ParentNotFound(parent_id.to_string()))?;
        parent.children.push(id);
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Remove `id` from its parent's child list (the node itself stays)
    pub(crate) fn unlink(&mut self, id: NodeId) {
        let parent = self.get(id).and_then(Node::parent);
        if let Some(group) = parent.and_then(|p| self.group_mut(p)) {
            group.children.retain(|c| *c != id);
        }
    }

    /// Remove a node from the map
    pub(crate) fn take(&mut self, id: NodeId) -> Option<Node> {
        if self.recycle_bin == Some(id) {
            self.recycle_bin = None;
        }
        self.nodes.remove(&id)
    }

    pub(crate) fn set_recycle_bin(&mut self, id: NodeId) {
        self.recycle_bin = Some(id);
    }
}
