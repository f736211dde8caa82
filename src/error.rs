//! Custom error types for Coffer
//!
//! This module defines the error hierarchy for the credential database using
//! thiserror for ergonomic error definitions. Every variant maps onto one
//! [`ErrorKind`] so collaborators can decide how to recover without matching
//! on individual variants.

use thiserror::Error;

/// Broad classification of failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A node, parent or field is missing
    NotFound,
    /// A tree invariant would be broken (cycle, duplicate key, root move)
    StructuralViolation,
    /// A caller-supplied policy forbids the operation
    PolicyViolation,
    /// Key material or protected memory misuse, authentication failure
    SecurityViolation,
    /// The session writer is held by another caller
    ConcurrencyViolation,
    /// File system failure
    Io,
    /// Malformed input (bad dates, empty names, bad configuration)
    Validation,
}

/// The main error type for Coffer operations
#[derive(Error, Debug)]
pub enum CofferError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// The requested parent does not exist or is not a group
    #[error("Parent group not found: {0}")]
    ParentNotFound(String),

    /// Reparenting would make a group its own ancestor
    #[error("Cannot move {node} under {new_parent}: cycle detected")]
    CycleDetected { node: String, new_parent: String },

    /// A field name appears twice in one entry
    #[error("Duplicate field: {0}")]
    DuplicateField(String),

    /// Other structural violations (moving or deleting the root, corrupt trees)
    #[error("Structural violation: {0}")]
    Structure(String),

    /// Creation inside the recycle bin is forbidden by policy
    #[error("Node is inside the recycle bin: {0}")]
    InRecycleBin(String),

    /// Recycle bin policy prevents a soft delete
    #[error("Recycle bin unavailable: {0}")]
    RecycleBin(String),

    /// The session was opened read-only
    #[error("Database is read-only")]
    ReadOnly,

    /// Copying protected values is disabled by policy
    #[error("Copying protected fields is not allowed")]
    CopyNotAllowed,

    /// A protected value was accessed after it was released
    #[error("Protected value used after release")]
    UseAfterRelease,

    /// Encryption errors (bad key, tampered data, cipher failures)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Another writer currently holds the session
    #[error("Session is busy")]
    SessionBusy,

    /// Two-step instant selection driven out of order
    #[error("Selection out of order: {0}")]
    SelectionOutOfOrder(String),

    /// The collaborator side of a selection channel went away
    #[error("Selection unavailable: {0}")]
    SelectionUnavailable(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CofferError {
    /// Create a "not found" error for any node
    pub fn node_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Node",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for groups
    pub fn group_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Group",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for entries
    pub fn entry_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Entry",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for entry fields
    pub fn field_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Field",
            identifier: identifier.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::ParentNotFound(_) => ErrorKind::NotFound,
            Self::CycleDetected { .. } | Self::DuplicateField(_) | Self::Structure(_) => {
                ErrorKind::StructuralViolation
            }
            Self::InRecycleBin(_) | Self::RecycleBin(_) | Self::ReadOnly | Self::CopyNotAllowed => {
                ErrorKind::PolicyViolation
            }
            Self::UseAfterRelease | Self::Encryption(_) => ErrorKind::SecurityViolation,
            Self::SessionBusy => ErrorKind::ConcurrencyViolation,
            Self::Io(_) | Self::Storage(_) => ErrorKind::Io,
            Self::Config(_)
            | Self::Json(_)
            | Self::Validation(_)
            | Self::SelectionOutOfOrder(_)
            | Self::SelectionUnavailable(_) => ErrorKind::Validation,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for CofferError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CofferError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for Coffer operations
pub type CofferResult<T> = Result<T, CofferError>;
