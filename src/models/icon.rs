//! Node icons
//!
//! A node references either one of the built-in icons by number or a custom
//! icon stored with the database. How an icon is drawn is up to the
//! collaborator and its selected icon pack.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::CustomIconId;

/// Number of built-in icons
pub const STANDARD_ICON_COUNT: u32 = 69;

/// Default icon for new entries (key)
pub const ENTRY_DEFAULT_ICON: u32 = 0;

/// Default icon for new groups (folder)
pub const GROUP_DEFAULT_ICON: u32 = 48;

/// Icon used for the recycle bin group
pub const RECYCLE_BIN_ICON: u32 = 43;

/// Reference to an icon resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum IconImage {
    /// Built-in icon by number
    Standard(u32),
    /// Custom icon stored with the database
    Custom(CustomIconId),
}

impl IconImage {
    /// Default icon for groups
    pub fn group_default() -> Self {
        Self::Standard(GROUP_DEFAULT_ICON)
    }

    /// Default icon for entries
    pub fn entry_default() -> Self {
        Self::Standard(ENTRY_DEFAULT_ICON)
    }

    /// Check that a standard icon number is in range
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Standard(n) => *n < STANDARD_ICON_COUNT,
            Self::Custom(_) => true,
        }
    }
}

impl Default for IconImage {
    fn default() -> Self {
        Self::group_default()
    }
}

impl fmt::Display for IconImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(n) => write!(f, "standard:{}", n),
            Self::Custom(id) => write!(f, "custom:{}", id),
        }
    }
}
