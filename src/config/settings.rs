//! User settings for Coffer
//!
//! Persisted preferences: history and undo retention, recycle bin policy,
//! protected field names, copy policy, display ordering, key derivation cost
//! and backup retention. A session never reads these directly; it receives a
//! [`SessionConfig`] built by [`Settings::session_config`].

use serde::{Deserialize, Serialize};

use super::paths::CofferPaths;
use super::session::{KdfCost, SessionConfig};
use crate::error::CofferError;
use crate::models::field::PASSWORD_FIELD;
use crate::models::SortOptions;

/// Backup retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Number of backups kept per database
    #[serde(default = "default_backup_retention")]
    pub retention: usize,

    /// Skip backups entirely
    #[serde(default)]
    pub omit: bool,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            retention: default_backup_retention(),
            omit: false,
        }
    }
}

/// User settings for Coffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Entry history snapshots kept per entry
    #[serde(default = "default_history_max_items")]
    pub history_max_items: usize,

    /// Undo steps kept per session
    #[serde(default = "default_undo_limit")]
    pub undo_limit: usize,

    /// Soft delete into a recycle bin
    #[serde(default = "default_true")]
    pub recycle_bin_enabled: bool,

    /// Allow new nodes inside the recycle bin
    #[serde(default)]
    pub allow_create_in_recycle_bin: bool,

    /// Field names always stored protected
    #[serde(default = "default_protected_fields")]
    pub protected_fields: Vec<String>,

    /// Allow protected values to be copied out
    #[serde(default)]
    pub allow_copy_protected_fields: bool,

    /// Open databases read-only
    #[serde(default)]
    pub read_only: bool,

    /// Accept an empty passphrase
    #[serde(default)]
    pub empty_password_allowed: bool,

    /// Icon pack used to render standard icons
    #[serde(default = "default_icon_pack")]
    pub icon_pack_id: String,

    /// Display ordering of group children
    #[serde(default)]
    pub sort: SortOptions,

    /// Key derivation cost for new databases
    #[serde(default)]
    pub kdf: KdfCost,

    /// Backup policy
    #[serde(default)]
    pub backup: BackupSettings,
}

fn default_schema_version() -> u32 {
    1
}

fn default_history_max_items() -> usize {
    10
}

fn default_undo_limit() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_protected_fields() -> Vec<String> {
    vec![PASSWORD_FIELD.to_string()]
}

fn default_icon_pack() -> String {
    "classic".to_string()
}

fn default_backup_retention() -> usize {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            history_max_items: default_history_max_items(),
            undo_limit: default_undo_limit(),
            recycle_bin_enabled: true,
            allow_create_in_recycle_bin: false,
            protected_fields: default_protected_fields(),
            allow_copy_protected_fields: false,
            read_only: false,
            empty_password_allowed: false,
            icon_pack_id: default_icon_pack(),
            sort: SortOptions::default(),
            kdf: KdfCost::default(),
            backup: BackupSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or fall back to defaults if the file doesn't exist
    pub fn load_or_create(paths: &CofferPaths) -> Result<Self, CofferError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| CofferError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                CofferError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &CofferPaths) -> Result<(), CofferError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| CofferError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| CofferError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    /// Build the explicit configuration a session runs with
    pub fn session_config(&self, paths: &CofferPaths) -> SessionConfig {
        SessionConfig {
            history_max_items: self.history_max_items,
            undo_limit: self.undo_limit,
            recycle_bin_enabled: self.recycle_bin_enabled,
            allow_create_in_recycle_bin: self.allow_create_in_recycle_bin,
            protected_fields: self.protected_fields.clone(),
            allow_copy_protected_fields: self.allow_copy_protected_fields,
            read_only: self.read_only,
            empty_password_allowed: self.empty_password_allowed,
            icon_pack_id: self.icon_pack_id.clone(),
            sort: self.sort,
            kdf: self.kdf,
            backup_dir: Some(paths.backup_dir()),
            backup_retention: self.backup.retention,
            omit_backup: self.backup.omit,
            audit_log: Some(paths.audit_log()),
        }
    }

    /// Set a setting by its JSON key, parsing `value` as JSON
    ///
    /// Bare words that are not valid JSON are taken as strings, so
    /// `icon_pack_id material` works without quoting.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CofferError> {
        let mut tree = serde_json::to_value(&*self)?;
        let object = tree
            .as_object_mut()
            .ok_or_else(|| CofferError::Config("Settings are not an object".into()))?;
        let slot = object
            .get_mut(key)
            .ok_or_else(|| CofferError::Config(format!("Unknown setting: {}", key)))?;
        *slot = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        *self = serde_json::from_value(tree)
            .map_err(|e| CofferError::Config(format!("Invalid value for {}: {}", key, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortMethod;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.history_max_items, 10);
        assert_eq!(settings.undo_limit, 50);
        assert!(settings.recycle_bin_enabled);
        assert!(!settings.allow_copy_protected_fields);
        assert_eq!(settings.protected_fields, vec!["Password".to_string()]);
        assert_eq!(settings.backup.retention, 5);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = CofferPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        settings.history_max_items = 3;
        settings.read_only = true;

        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.history_max_items, 3);
        assert!(loaded.read_only);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"undo_limit": 7}"#).unwrap();
        assert_eq!(settings.undo_limit, 7);
        assert_eq!(settings.history_max_items, 10);
        assert!(settings.sort.groups_before);
    }

    #[test]
    fn test_session_config() {
        let temp_dir = TempDir::new().unwrap();
        let paths = CofferPaths::with_base_dir(temp_dir.path().to_path_buf());
        let mut settings = Settings::default();
        settings.backup.omit = true;

        let config = settings.session_config(&paths);
        assert_eq!(config.backup_dir, Some(paths.backup_dir()));
        assert_eq!(config.audit_log, Some(paths.audit_log()));
        assert!(config.omit_backup);
        assert!(config.is_protected_field("Password"));
    }

    #[test]
    fn test_set_by_key() {
        let mut settings = Settings::default();
        settings.set("history_max_items", "4").unwrap();
        settings.set("icon_pack_id", "material").unwrap();
        settings.set("sort", r#"{"method":"username"}"#).unwrap();
        assert_eq!(settings.history_max_items, 4);
        assert_eq!(settings.icon_pack_id, "material");
        assert_eq!(settings.sort.method, SortMethod::Username);

        assert!(settings.set("nope", "1").is_err());
        assert!(settings.set("undo_limit", "\"many\"").is_err());
    }
}
