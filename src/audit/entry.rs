//! Audit entry data structures
//!
//! Defines the structure of audit log entries. Entries carry metadata only:
//! what happened to which node, never a field value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::NodeKind;
use crate::services::mutation::{ChangeAction, ChangeRecord};

/// Types of operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOperation {
    /// Node was created
    Create,
    /// Node was updated
    Update,
    /// Node was moved to another group
    Move,
    /// Node was moved into the recycle bin
    Trash,
    /// Node was removed permanently
    Delete,
    /// Node was restored from the recycle bin
    Restore,
    /// The last operation was undone
    Undo,
    /// The database passphrase was changed
    Rekey,
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditOperation::Create => write!(f, "CREATE"),
            AuditOperation::Update => write!(f, "UPDATE"),
            AuditOperation::Move => write!(f, "MOVE"),
            AuditOperation::Trash => write!(f, "TRASH"),
            AuditOperation::Delete => write!(f, "DELETE"),
            AuditOperation::Restore => write!(f, "RESTORE"),
            AuditOperation::Undo => write!(f, "UNDO"),
            AuditOperation::Rekey => write!(f, "REKEY"),
        }
    }
}

impl From<ChangeAction> for AuditOperation {
    fn from(action: ChangeAction) -> Self {
        match action {
            ChangeAction::Created => AuditOperation::Create,
            ChangeAction::Updated => AuditOperation::Update,
            ChangeAction::Moved => AuditOperation::Move,
            ChangeAction::Trashed => AuditOperation::Trash,
            ChangeAction::Deleted => AuditOperation::Delete,
            ChangeAction::Restored => AuditOperation::Restore,
        }
    }
}

/// Types of entities that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Group,
    Entry,
    Database,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Group => write!(f, "Group"),
            EntityType::Entry => write!(f, "Entry"),
            EntityType::Database => write!(f, "Database"),
        }
    }
}

impl From<NodeKind> for EntityType {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Group => EntityType::Group,
            NodeKind::Entry => EntityType::Entry,
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation occurred (UTC)
    pub timestamp: DateTime<Utc>,

    /// Type of operation performed
    pub operation: AuditOperation,

    /// Type of entity affected
    pub entity_type: EntityType,

    /// ID of the affected entity (node id, or database path)
    pub entity_id: String,

    /// Human-readable description of the entity (e.g., the node title)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,

    /// Parent group after the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl AuditEntry {
    /// Entry describing an applied change
    pub fn from_change(record: &ChangeRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            operation: record.action.into(),
            entity_type: record.kind.into(),
            entity_id: record.node.to_string(),
            entity_name: Some(record.title.clone()),
            parent_id: record.parent.map(|p| p.to_string()),
        }
    }

    /// Entry describing a database-wide event
    pub fn database(operation: AuditOperation, database: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            entity_type: EntityType::Database,
            entity_id: database.into(),
            entity_name: None,
            parent_id: None,
        }
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.operation,
            self.entity_type,
            self.entity_id
        );

        if let Some(name) = &self.entity_name {
            output.push_str(&format!(" ({})", name));
        }

        if let Some(parent) = &self.parent_id {
            output.push_str(&format!(" in {}", parent));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeId;

    fn record(action: ChangeAction) -> ChangeRecord {
        ChangeRecord {
            action,
            node: NodeId::new(),
            kind: NodeKind::Entry,
            title: "Email".into(),
            parent: Some(NodeId::new()),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(AuditOperation::Create.to_string(), "CREATE");
        assert_eq!(AuditOperation::Trash.to_string(), "TRASH");
        assert_eq!(AuditOperation::Rekey.to_string(), "REKEY");
    }

    #[test]
    fn test_from_change() {
        let change = record(ChangeAction::Trashed);
        let entry = AuditEntry::from_change(&change);

        assert_eq!(entry.operation, AuditOperation::Trash);
        assert_eq!(entry.entity_type, EntityType::Entry);
        assert_eq!(entry.entity_id, change.node.to_string());
        assert_eq!(entry.entity_name.as_deref(), Some("Email"));
        assert_eq!(entry.timestamp, change.timestamp);
    }

    #[test]
    fn test_serialization() {
        let entry = AuditEntry::from_change(&record(ChangeAction::Created));

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"operation\":\"create\""));
        let deserialized: AuditEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.operation, AuditOperation::Create);
        assert_eq!(deserialized.entity_type, EntityType::Entry);
    }

    #[test]
    fn test_human_readable_format() {
        let entry = AuditEntry::database(AuditOperation::Undo, "/tmp/vault.cdb");
        let formatted = entry.format_human_readable();
        assert!(formatted.contains("UNDO"));
        assert!(formatted.contains("Database"));
        assert!(formatted.contains("/tmp/vault.cdb"));
    }
}
