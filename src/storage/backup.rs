//! Rolling backups of database files
//!
//! Before a save overwrites a database, the previous file is copied to
//! `<backup_dir>/<stem>-<YYYYMMDD-HHMMSS-micros>.cdb`. Only the newest
//! `retention` copies per database are kept.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{CofferError, CofferResult};

const BACKUP_EXTENSION: &str = "cdb";

/// Metadata about a backup
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    /// Backup filename
    pub filename: String,
    /// Full path to backup
    pub path: PathBuf,
    /// When the backup was created
    pub created_at: DateTime<Utc>,
    /// Size in bytes
    pub size_bytes: u64,
}

/// Manages backup creation and retention for one database
pub struct BackupManager {
    backup_dir: PathBuf,
    stem: String,
    retention: usize,
}

impl BackupManager {
    /// Backups of `database` go to `backup_dir`
    pub fn new(backup_dir: PathBuf, database: &Path, retention: usize) -> Self {
        let stem = database
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database".to_string());
        Self {
            backup_dir,
            stem,
            retention,
        }
    }

    /// Copy `database` into the backup directory
    ///
    /// Returns the path to the created backup file.
    pub fn create_backup(&self, database: &Path) -> CofferResult<PathBuf> {
        fs::create_dir_all(&self.backup_dir)
            .map_err(|e| CofferError::Io(format!("Failed to create backup directory: {}", e)))?;

        let now = Utc::now();
        let filename = format!(
            "{}-{}-{:06}.{}",
            self.stem,
            now.format("%Y%m%d-%H%M%S"),
            now.timestamp_subsec_micros(),
            BACKUP_EXTENSION
        );
        let backup_path = self.backup_dir.join(filename);

        fs::copy(database, &backup_path)
            .map_err(|e| CofferError::Io(format!("Failed to write backup file: {}", e)))?;

        Ok(backup_path)
    }

    /// List backups of this database, newest first
    pub fn list_backups(&self) -> CofferResult<Vec<BackupInfo>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();

        for entry in fs::read_dir(&self.backup_dir)
            .map_err(|e| CofferError::Io(format!("Failed to read backup directory: {}", e)))?
        {
            let entry = entry
                .map_err(|e| CofferError::Io(format!("Failed to read directory entry: {}", e)))?;

            if let Some(info) = self.parse_backup_info(&entry.path()) {
                backups.push(info);
            }
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(backups)
    }

    fn parse_backup_info(&self, path: &Path) -> Option<BackupInfo> {
        if path.extension()? != BACKUP_EXTENSION {
            return None;
        }
        let filename = path.file_name()?.to_string_lossy().into_owned();
        let stamp = filename
            .strip_prefix(self.stem.as_str())?
            .strip_prefix('-')?
            .strip_suffix(".cdb")?;
        let created_at = parse_backup_timestamp(stamp)?;
        let size_bytes = fs::metadata(path).ok()?.len();

        Some(BackupInfo {
            filename,
            path: path.to_path_buf(),
            created_at,
            size_bytes,
        })
    }

    /// Delete all but the newest `retention` backups
    pub fn enforce_retention(&self) -> CofferResult<Vec<PathBuf>> {
        let mut deleted = Vec::new();
        for backup in self.list_backups()?.into_iter().skip(self.retention) {
            fs::remove_file(&backup.path)
                .map_err(|e| CofferError::Io(format!("Failed to delete old backup: {}", e)))?;
            deleted.push(backup.path);
        }
        Ok(deleted)
    }

    /// Create a backup and then enforce retention policy
    pub fn create_backup_with_retention(&self, database: &Path) -> CofferResult<(PathBuf, Vec<PathBuf>)> {
        let backup_path = self.create_backup(database)?;
        let deleted = self.enforce_retention()?;
        debug!(
            backup = %backup_path.display(),
            pruned = deleted.len(),
            "Created backup"
        );
        Ok((backup_path, deleted))
    }

    /// Get the most recent backup
    pub fn get_latest_backup(&self) -> CofferResult<Option<BackupInfo>> {
        Ok(self.list_backups()?.into_iter().next())
    }
}

/// Parse `YYYYMMDD-HHMMSS-micros`
fn parse_backup_timestamp(stamp: &str) -> Option<DateTime<Utc>> {
    let (seconds, micros) = stamp.rsplit_once('-')?;
    if micros.len() != 6 {
        return None;
    }
    let micros: i64 = micros.parse().ok()?;
    let naive = NaiveDateTime::parse_from_str(seconds, "%Y%m%d-%H%M%S").ok()?;
    Some(naive.and_utc() + Duration::microseconds(micros))
}
