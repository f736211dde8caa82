//! Group edit protocol
//!
//! A collaborator edits a group as a [`GroupInfo`] draft and then either
//! approves or cancels it. Approval validates the name and routes to group
//! creation or update on the session; cancellation leaves the session
//! untouched.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CofferError, CofferResult};
use crate::models::{GroupInfo, NodeId, Tree};
use crate::services::mutation::{ChangeRecord, Operation};
use crate::session::Session;

/// What an edit draft is for, serialized by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EditAction {
    /// A new group under `parent`
    Creation { parent: NodeId },
    /// Changes to an existing group
    Update { group: NodeId },
}

/// Why a group name was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameRejection {
    Empty,
    DuplicateSibling,
}

impl fmt::Display for NameRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameRejection::Empty => write!(f, "Group name cannot be empty"),
            NameRejection::DuplicateSibling => {
                write!(f, "A group with this name already exists here")
            }
        }
    }
}

/// Outcome of a group name check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValidation {
    pub is_error: bool,
    pub reason: Option<NameRejection>,
}

impl NameValidation {
    pub fn accepted() -> Self {
        Self {
            is_error: false,
            reason: None,
        }
    }

    pub fn rejected(reason: NameRejection) -> Self {
        Self {
            is_error: true,
            reason: Some(reason),
        }
    }

    /// Turn a rejection into a validation error
    pub fn into_result(self) -> CofferResult<()> {
        match self.reason {
            Some(reason) if self.is_error => Err(CofferError::Validation(reason.to_string())),
            _ => Ok(()),
        }
    }
}

/// Check a group name against its future siblings
///
/// `editing` is the group being renamed, which never conflicts with itself.
/// Names are compared trimmed and case-insensitively.
pub fn is_valid_group_name(tree: &Tree, parent: Option<NodeId>, name: &str, editing: Option<NodeId>) -> NameValidation {
    let name = name.trim();
    if name.is_empty() {
        return NameValidation::rejected(NameRejection::Empty);
    }
    let Some(siblings) = parent.and_then(|p| tree.children_of(p).ok()) else {
        return NameValidation::accepted();
    };
    let duplicate = siblings
        .iter()
        .filter_map(|n| n.as_group())
        .filter(|g| Some(g.base.id) != editing)
        .any(|g| g.base.title.trim().to_lowercase() == name.to_lowercase());
    if duplicate {
        NameValidation::rejected(NameRejection::DuplicateSibling)
    } else {
        NameValidation::accepted()
    }
}

/// Service driving the approve/cancel protocol against a session
pub struct EditService<'a> {
    session: &'a Session,
}

impl<'a> EditService<'a> {
    /// Create a new edit service
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Draft for an action: defaults for a creation, current values for an update
    pub fn draft(&self, action: EditAction) -> CofferResult<GroupInfo> {
        match action {
            EditAction::Creation { .. } => Ok(GroupInfo::default()),
            EditAction::Update { group } => {
                let tree = self.session.snapshot();
                tree.group(group)
                    .map(GroupInfo::from_group)
                    .ok_or_else(|| CofferError::group_not_found(group.to_string()))
            }
        }
    }

    /// Check the draft's name for this action
    pub fn validate_name(&self, action: EditAction, name: &str) -> CofferResult<NameValidation> {
        let tree = self.session.snapshot();
        let (parent, editing) = match action {
            EditAction::Creation { parent } => (Some(parent), None),
            EditAction::Update { group } => {
                let node = tree
                    .group(group)
                    .ok_or_else(|| CofferError::group_not_found(group.to_string()))?;
                (node.base.parent, Some(group))
            }
        };
        Ok(is_valid_group_name(&tree, parent, name, editing))
    }

    /// Commit the draft
    pub fn approve(&self, action: EditAction, info: GroupInfo) -> CofferResult<ChangeRecord> {
        self.validate_name(action, &info.title)?.into_result()?;
        let info = GroupInfo {
            title: info.title.trim().to_string(),
            ..info
        };
        let operation = match action {
            EditAction::Creation { parent } => Operation::CreateGroup { parent, info },
            EditAction::Update { group } => Operation::UpdateGroup { id: group, info },
        };
        self.session.apply(operation)
    }

    /// Discard the draft
    pub fn cancel(&self, action: EditAction, info: GroupInfo) {
        debug!(?action, title = %info.title, "Group edit cancelled");
    }
}
