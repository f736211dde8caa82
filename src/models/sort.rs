//! Display ordering of a group's children

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::node::{Node, NodeKind};

/// How children are ordered for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMethod {
    /// Stored order
    Db,
    /// By title, case-insensitive
    #[default]
    Title,
    /// By user name, case-insensitive; groups sort by title
    Username,
    /// By creation time
    CreationTime,
    /// By last modification time
    LastModified,
}

/// Sorting preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    #[serde(default)]
    pub method: SortMethod,
    #[serde(default = "default_true")]
    pub ascending: bool,
    /// List groups before entries
    #[serde(default = "default_true")]
    pub groups_before: bool,
    /// Keep the recycle bin last
    #[serde(default = "default_true")]
    pub recycle_bin_bottom: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            method: SortMethod::default(),
            ascending: true,
            groups_before: true,
            recycle_bin_bottom: true,
        }
    }
}

fn sort_label(node: &Node, method: SortMethod) -> String {
    match (method, node) {
        (SortMethod::Username, Node::Entry(e)) => e.username().unwrap_or_default().to_lowercase(),
        _ => node.title().to_lowercase(),
    }
}

impl SortOptions {
    /// Order `nodes` in place; stable, so ties keep stored order
    pub fn apply(&self, nodes: &mut [&Node]) {
        let method = self.method;
        match method {
            SortMethod::Db => {}
            SortMethod::Title | SortMethod::Username => {
                nodes.sort_by_cached_key(|n| sort_label(n, method));
            }
            SortMethod::CreationTime => nodes.sort_by_key(|n| n.base().created_at),
            SortMethod::LastModified => nodes.sort_by_key(|n| n.base().last_modified),
        }
        if !self.ascending {
            nodes.reverse();
        }
        if self.groups_before {
            nodes.sort_by(|a, b| match (a.kind(), b.kind()) {
                (NodeKind::Group, NodeKind::Entry) => Ordering::Less,
                (NodeKind::Entry, NodeKind::Group) => Ordering::Greater,
                _ => Ordering::Equal,
            });
        }
        if self.recycle_bin_bottom {
            nodes.sort_by_key(|n| n.as_group().is_some_and(|g| g.recycle_bin));
        }
    }
}
