//! Explicit configuration handed to a database session
//!
//! Everything the engine and session consult at runtime lives here, so a
//! session never reaches for ambient state. Build one from
//! [`Settings::session_config`](super::settings::Settings::session_config) or
//! start from `Default` in tests.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::crypto::KeyDerivationParams;
use crate::models::field::PASSWORD_FIELD;
use crate::models::SortOptions;

/// Argon2 cost used when a database is created or re-keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfCost {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    /// Lanes
    pub parallelism: u32,
}

impl Default for KdfCost {
    fn default() -> Self {
        let defaults = KeyDerivationParams::default();
        Self {
            memory_cost: defaults.memory_cost,
            time_cost: defaults.time_cost,
            parallelism: defaults.parallelism,
        }
    }
}

impl KdfCost {
    /// Fresh parameters with a random salt at this cost
    pub fn params(&self) -> KeyDerivationParams {
        KeyDerivationParams::with_cost(self.memory_cost, self.time_cost, self.parallelism)
    }
}

/// Runtime policy for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Entry history snapshots kept per entry
    pub history_max_items: usize,

    /// Undo steps kept by the session
    pub undo_limit: usize,

    /// Soft deletes move nodes into a recycle bin
    pub recycle_bin_enabled: bool,

    /// Allow new nodes inside the recycle bin
    pub allow_create_in_recycle_bin: bool,

    /// Field names always stored protected
    pub protected_fields: Vec<String>,

    /// Allow protected values to leave the session through copy
    pub allow_copy_protected_fields: bool,

    /// Reject every mutation
    pub read_only: bool,

    /// Accept an empty passphrase on create and change
    pub empty_password_allowed: bool,

    /// Icon pack used to render standard icons
    pub icon_pack_id: String,

    /// Display ordering for children
    pub sort: SortOptions,

    /// Key derivation cost for new keys
    pub kdf: KdfCost,

    /// Where rolling backups of the database file go; `None` disables them
    pub backup_dir: Option<PathBuf>,

    /// Backups kept per database
    pub backup_retention: usize,

    /// Skip the backup step on save
    pub omit_backup: bool,

    /// JSONL audit log; `None` disables it
    pub audit_log: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_max_items: 10,
            undo_limit: 50,
            recycle_bin_enabled: true,
            allow_create_in_recycle_bin: false,
            protected_fields: vec![PASSWORD_FIELD.to_string()],
            allow_copy_protected_fields: false,
            read_only: false,
            empty_password_allowed: false,
            icon_pack_id: "classic".to_string(),
            sort: SortOptions::default(),
            kdf: KdfCost::default(),
            backup_dir: None,
            backup_retention: 5,
            omit_backup: false,
            audit_log: None,
        }
    }
}

impl SessionConfig {
    /// Whether `name` must be stored protected
    pub fn is_protected_field(&self, name: &str) -> bool {
        self.protected_fields.iter().any(|f| f == name)
    }
}

/// Default policy with a cheap key derivation cost
#[cfg(test)]
pub(crate) fn test_config() -> SessionConfig {
    SessionConfig {
        kdf: KdfCost {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        },
        ..SessionConfig::default()
    }
}
