//! Data transfer structs exchanged with collaborators
//!
//! A caller gathers its edits into a [`GroupInfo`] or [`EntryInfo`] and hands
//! it to the session. These structs carry no behavior of their own.

use serde::{Deserialize, Serialize};

use super::expiry::Expiry;
use super::field::FieldValue;
use super::icon::IconImage;
use super::node::{Entry, Group};

/// Editable properties of a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub icon: IconImage,
    #[serde(default)]
    pub expiry: Expiry,
}

impl GroupInfo {
    /// Info for a new group with the given title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            notes: None,
            icon: IconImage::group_default(),
            expiry: Expiry::never(),
        }
    }

    /// Current properties of an existing group
    pub fn from_group(group: &Group) -> Self {
        Self {
            title: group.base.title.clone(),
            notes: group.base.notes.clone(),
            icon: group.base.icon,
            expiry: group.base.expiry,
        }
    }
}

impl Default for GroupInfo {
    fn default() -> Self {
        Self::new("")
    }
}

/// Editable properties of an entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    pub title: String,
    pub notes: Option<String>,
    pub icon: IconImage,
    pub expiry: Expiry,
    /// Fields in the order supplied; names must be unique
    pub fields: Vec<(String, FieldValue)>,
}

impl EntryInfo {
    /// Info for a new entry with the given title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            notes: None,
            icon: IconImage::entry_default(),
            expiry: Expiry::never(),
            fields: Vec::new(),
        }
    }

    /// Add a field
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// Set or replace a field
    pub fn set_field(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Remove a field; returns whether it existed
    pub fn remove_field(&mut self, name: &str) -> bool {
        let before = self.fields.len();
        self.fields.retain(|(n, _)| n != name);
        before != self.fields.len()
    }

    /// Current properties of an existing entry
    pub fn from_entry(entry: &Entry) -> Self {
        Self {
            title: entry.base.title.clone(),
            notes: entry.base.notes.clone(),
            icon: entry.base.icon,
            expiry: entry.base.expiry,
            fields: entry
                .fields
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_info_serde() {
        let info = GroupInfo::new("Work");
        let json = serde_json::to_string(&info).unwrap();
        let back: GroupInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, back);
    }

    #[test]
    fn test_set_field_replaces() {
        let mut info = EntryInfo::new("Email").with_field("UserName", FieldValue::plain("a"));
        info.set_field("UserName", FieldValue::plain("b"));
        assert_eq!(info.fields.len(), 1);
        assert_eq!(info.fields[0].1.as_plain(), Some("b"));
        assert!(info.remove_field("UserName"));
        assert!(!info.remove_field("UserName"));
    }
}
