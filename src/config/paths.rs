//! Path management for Coffer
//!
//! Resolves where configuration, the default database, backups and the
//! audit log live.
//!
//! ## Path Resolution Order
//!
//! 1. `COFFER_DATA_DIR` environment variable (if set)
//! 2. The platform configuration directory from [`directories::ProjectDirs`]
//!    (`~/.config/coffer` on Linux)

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::CofferError;

/// Environment variable overriding the base directory
pub const DATA_DIR_ENV: &str = "COFFER_DATA_DIR";

/// Manages all paths used by Coffer
#[derive(Debug, Clone)]
pub struct CofferPaths {
    /// Base directory for all Coffer data
    base_dir: PathBuf,
}

impl CofferPaths {
    /// Create a new CofferPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> Result<Self, CofferError> {
        let base_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(custom) => PathBuf::from(custom),
            None => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create CofferPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the data directory holding databases
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the backup directory
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to the audit log
    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    /// Get the path of the database used when none is given
    pub fn default_database(&self) -> PathBuf {
        self.data_dir().join("vault.cdb")
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<(), CofferError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| CofferError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| CofferError::Io(format!("Failed to create data directory: {}", e)))?;

        std::fs::create_dir_all(self.backup_dir())
            .map_err(|e| CofferError::Io(format!("Failed to create backup directory: {}", e)))?;

        Ok(())
    }

    /// Check if Coffer has been initialized (config file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

fn resolve_default_path() -> Result<PathBuf, CofferError> {
    ProjectDirs::from("", "", "coffer")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| CofferError::Config("Could not determine a home directory".into()))
}
