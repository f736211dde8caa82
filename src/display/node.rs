//! Node display formatting
//!
//! Formats groups and entries for terminal output in tree, table and detail
//! views. Protected values are masked unless the caller supplies them.

use chrono::Utc;

use crate::models::{Entry, FieldValue, Node, NodeId, SortOptions, Tree};

const MASK: &str = "********";

/// Format the whole tree with box-drawing branches
pub fn format_tree(tree: &Tree, sort: &SortOptions) -> String {
    let mut output = format!("{}\n", tree.root().base.title);
    push_branch(tree, tree.root_id(), sort, "", &mut output);
    output
}

fn push_branch(tree: &Tree, group: NodeId, sort: &SortOptions, indent: &str, output: &mut String) {
    let Ok(children) = tree.children_sorted(group, sort) else {
        return;
    };
    for (i, child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;
        let prefix = if is_last { "└── " } else { "├── " };
        output.push_str(&format!("{}{}{}\n", indent, prefix, node_label(child)));

        if let Node::Group(g) = child {
            let next = format!("{}{}", indent, if is_last { "    " } else { "│   " });
            push_branch(tree, g.base.id, sort, &next, output);
        }
    }
}

fn node_label(node: &Node) -> String {
    match node {
        Node::Group(g) if g.recycle_bin => format!("{}/ (recycle bin)", g.base.title),
        Node::Group(g) => format!("{}/", g.base.title),
        Node::Entry(e) => match e.username() {
            Some(user) => format!("{} [{}]", e.base.title, user),
            None => e.base.title.clone(),
        },
    }
}

/// Format the direct children of a group as a table
pub fn format_children(children: &[Node]) -> String {
    if children.is_empty() {
        return "Group is empty.\n".to_string();
    }

    let title_width = children
        .iter()
        .map(|n| n.title().len())
        .max()
        .unwrap_or(5)
        .max(5);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<5}  {:<title_width$}  {:<16}  {}\n",
        "Kind",
        "Title",
        "Modified",
        "ID",
        title_width = title_width,
    ));
    output.push_str(&format!(
        "{:-<5}  {:-<title_width$}  {:-<16}  {:-<11}\n",
        "",
        "",
        "",
        "",
        title_width = title_width,
    ));

    for node in children {
        output.push_str(&format!(
            "{:<5}  {:<title_width$}  {:<16}  {}\n",
            node.kind().to_string(),
            node.title(),
            node.base().last_modified.format("%Y-%m-%d %H:%M").to_string(),
            node.id(),
            title_width = title_width,
        ));
    }

    output
}

/// Format an entry with all its fields
///
/// `reveal` is asked for the plaintext of each protected field; `None`
/// keeps the value masked.
pub fn format_entry_details<F>(path: &str, entry: &Entry, mut reveal: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut output = String::new();
    output.push_str(&format!("{}\n", entry.base.title));
    output.push_str(&format!("{}\n", "=".repeat(entry.base.title.chars().count().max(1))));
    output.push_str(&format!("Path:      {}\n", path));
    output.push_str(&format!("ID:        {}\n", entry.base.id));

    let name_width = entry.fields.keys().map(|k| k.len()).max().unwrap_or(0).max(8);
    for (name, value) in &entry.fields {
        let shown = match value {
            FieldValue::Plain(text) => text.clone(),
            FieldValue::Protected(_) => reveal(name).unwrap_or_else(|| MASK.to_string()),
        };
        output.push_str(&format!("{:<width$}:  {}\n", name, shown, width = name_width));
    }

    if let Some(notes) = &entry.base.notes {
        output.push_str(&format!("Notes:     {}\n", notes));
    }
    if entry.base.expiry.enabled {
        let expired = entry.base.expiry.is_expired(Utc::now().naive_utc());
        output.push_str(&format!(
            "Expires:   {}{}\n",
            entry.base.expiry.instant,
            if expired { " (expired)" } else { "" }
        ));
    }
    output.push_str(&format!(
        "Created:   {}\n",
        entry.base.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!(
        "Modified:  {}\n",
        entry.base.last_modified.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if !entry.history.is_empty() {
        output.push_str(&format!("History:   {} earlier version(s)\n", entry.history.len()));
    }

    output
}

/// Format the earlier versions of an entry, newest first
pub fn format_history(entry: &Entry) -> String {
    if entry.history.is_empty() {
        return format!("No history for '{}'.\n", entry.base.title);
    }

    let mut output = String::new();
    for (i, snapshot) in entry.history.iter().enumerate().rev() {
        let changed: Vec<&str> = snapshot
            .fields
            .iter()
            .filter(|(name, value)| entry.fields.get(*name) != Some(*value))
            .map(|(name, _)| name.as_str())
            .collect();
        output.push_str(&format!(
            "#{}  {}  {}",
            i + 1,
            snapshot.last_modified.format("%Y-%m-%d %H:%M:%S"),
            snapshot.title
        ));
        if !changed.is_empty() {
            output.push_str(&format!("  (differs: {})", changed.join(", ")));
        }
        output.push('\n');
    }
    output
}

/// Format search hits with their paths
pub fn format_search_results(tree: &Tree, hits: &[&Entry]) -> String {
    if hits.is_empty() {
        return "No matching entries.\n".to_string();
    }

    let mut output = String::new();
    for entry in hits {
        let path = tree
            .path_of(entry.base.id)
            .unwrap_or_else(|_| entry.base.title.clone());
        match entry.username() {
            Some(user) => output.push_str(&format!("{}  [{}]\n", path, user)),
            None => output.push_str(&format!("{}\n", path)),
        }
    }
    output.push_str(&format!("\n{} match(es)\n", hits.len()));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::session::test_config;
    use crate::models::{EntryInfo, GroupInfo, PASSWORD_FIELD, USERNAME_FIELD};
    use crate::services::mutation::{MutationEngine, Operation};

    fn sample_tree() -> (Tree, NodeId) {
        let config = test_config();
        let engine = MutationEngine::new(&config);
        let mut tree = Tree::new("vault");
        let root = tree.root_id();
        let work = engine
            .apply(
                &mut tree,
                Operation::CreateGroup {
                    parent: root,
                    info: GroupInfo::new("Work"),
                },
            )
            .unwrap()
            .node;
        let email = engine
            .apply(
                &mut tree,
                Operation::CreateEntry {
                    parent: work,
                    info: EntryInfo::new("Email")
                        .with_field(USERNAME_FIELD, FieldValue::plain("alice"))
                        .with_field(PASSWORD_FIELD, FieldValue::plain("s3cret")),
                },
            )
            .unwrap()
            .node;
        (tree, email)
    }

    #[test]
    fn test_format_tree() {
        let (tree, _) = sample_tree();
        let output = format_tree(&tree, &SortOptions::default());
        assert!(output.starts_with("vault\n"));
        assert!(output.contains("└── Work/"));
        assert!(output.contains("    └── Email [alice]"));
    }

    #[test]
    fn test_entry_details_masks_protected() {
        let (tree, email) = sample_tree();
        let entry = tree.entry(email).unwrap();

        let masked = format_entry_details("Work/Email", entry, |_| None);
        assert!(masked.contains(MASK));
        assert!(!masked.contains("s3cret"));
        assert!(masked.contains("alice"));

        let shown = format_entry_details("Work/Email", entry, |_| Some("s3cret".into()));
        assert!(shown.contains("s3cret"));
    }

    #[test]
    fn test_empty_views() {
        let (tree, email) = sample_tree();
        assert_eq!(format_children(&[]), "Group is empty.\n");
        assert!(format_history(tree.entry(email).unwrap()).starts_with("No history"));
        assert_eq!(format_search_results(&tree, &[]), "No matching entries.\n");
    }

    #[test]
    fn test_search_results_show_paths() {
        let (tree, _) = sample_tree();
        let hits = tree.search("mail");
        let output = format_search_results(&tree, &hits);
        assert!(output.contains("Work/Email  [alice]"));
        assert!(output.contains("1 match(es)"));
    }
}
