//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the session and services.

pub mod database;
pub mod entry;
pub mod group;

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};

use crate::config::{CofferPaths, SessionConfig, Settings};
use crate::crypto::SecureString;
use crate::error::{CofferError, CofferResult};
use crate::models::{Expiry, InstantKind, NodeId, Tree};
use crate::services::select_instant;
use crate::session::Session;

pub use database::{
    handle_config_command, handle_init_command, handle_log_command, handle_passphrase_command,
    handle_search_command, handle_tree_command,
};
pub use entry::{handle_entry_command, EntryCommands};
pub use group::{handle_group_command, GroupCommands};

/// Default variable the passphrase is read from
pub const PASSPHRASE_ENV: &str = "COFFER_PASSPHRASE";

/// Everything a command needs to find and open the database
#[derive(Debug)]
pub struct CliContext {
    pub paths: CofferPaths,
    pub settings: Settings,
    pub database: PathBuf,
    pub passphrase_env: String,
}

impl CliContext {
    pub fn new(paths: CofferPaths, settings: Settings, database: Option<PathBuf>, passphrase_env: String) -> Self {
        let database = database.unwrap_or_else(|| paths.default_database());
        Self {
            paths,
            settings,
            database,
            passphrase_env,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        self.settings.session_config(&self.paths)
    }

    /// Open the database, asking for the passphrase if needed
    pub fn open_session(&self) -> CofferResult<Session> {
        if !self.database.exists() {
            return Err(CofferError::Config(format!(
                "No database at {}. Run 'coffer init' first.",
                self.database.display()
            )));
        }
        let passphrase = read_passphrase(&self.passphrase_env, "Passphrase: ")?;
        Session::open(&self.database, passphrase, self.session_config())
    }
}

/// Read a passphrase from `env_var`, or prompt for it with hidden input
pub fn read_passphrase(env_var: &str, prompt: &str) -> CofferResult<SecureString> {
    if let Ok(value) = std::env::var(env_var) {
        return Ok(SecureString::from_string(value));
    }
    rpassword::prompt_password(prompt)
        .map(SecureString::from_string)
        .map_err(|e| CofferError::Io(format!("Failed to read passphrase: {}", e)))
}

/// Read a new passphrase; a prompted one must be typed twice
pub fn read_new_passphrase(env_var: &str) -> CofferResult<SecureString> {
    if let Ok(value) = std::env::var(env_var) {
        return Ok(SecureString::from_string(value));
    }
    let first = read_passphrase(env_var, "New passphrase: ")?;
    let second = read_passphrase(env_var, "Confirm passphrase: ")?;
    if first != second {
        return Err(CofferError::Validation("Passphrases do not match".into()));
    }
    Ok(first)
}

/// Resolve a slash path ("Work/Email") to a node
pub fn resolve_node(tree: &Tree, path: &str) -> CofferResult<NodeId> {
    tree.find_by_path(path)
        .ok_or_else(|| CofferError::node_not_found(path))
}

/// Resolve a slash path to a group; the empty path is the root
pub fn resolve_group(tree: &Tree, path: &str) -> CofferResult<NodeId> {
    let id = resolve_node(tree, path)?;
    tree.group(id)
        .map(|g| g.base.id)
        .ok_or_else(|| CofferError::group_not_found(path))
}

/// Resolve a slash path to an entry
pub fn resolve_entry(tree: &Tree, path: &str) -> CofferResult<NodeId> {
    let id = resolve_node(tree, path)?;
    tree.entry(id)
        .map(|e| e.base.id)
        .ok_or_else(|| CofferError::entry_not_found(path))
}

/// Parse "YYYY-MM-DD" or "YYYY-MM-DD HH:MM" into an expiry
///
/// A date alone keeps the time of an existing expiry; a new one becomes
/// date-only.
pub fn parse_expiry(input: &str, previous: &Expiry) -> CofferResult<Expiry> {
    let input = input.trim();
    let (date_part, time_part) = match input.split_once(' ') {
        Some((d, t)) => (d, Some(t.trim())),
        None => (input, None),
    };

    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| {
        CofferError::Validation(format!("Invalid date: '{}'. Use YYYY-MM-DD", date_part))
    })?;
    let time = time_part
        .map(|t| {
            NaiveTime::parse_from_str(t, "%H:%M")
                .map_err(|_| CofferError::Validation(format!("Invalid time: '{}'. Use HH:MM", t)))
        })
        .transpose()?;

    let base = match (time, previous.enabled) {
        (Some(_), _) => previous.instant.with_kind(InstantKind::DateTime),
        (None, true) => previous.instant,
        (None, false) => previous.instant.with_kind(InstantKind::Date),
    };
    Ok(Expiry::at(select_instant(base, date, time)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateInstant;
    use chrono::NaiveDateTime;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_parse_expiry_date_only() {
        let expiry = parse_expiry("2030-01-31", &Expiry::never()).unwrap();
        assert!(expiry.enabled);
        assert_eq!(expiry.instant.kind(), InstantKind::Date);
        assert_eq!(expiry.instant.to_string(), "2030-01-31");
    }

    #[test]
    fn test_parse_expiry_keeps_existing_time() {
        let previous = Expiry::at(DateInstant::date_time(at("2025-06-01 14:30")));
        let expiry = parse_expiry("2030-01-31", &previous).unwrap();
        assert_eq!(expiry.instant.value(), at("2030-01-31 14:30"));

        let expiry = parse_expiry("2030-01-31 08:05", &previous).unwrap();
        assert_eq!(expiry.instant.value(), at("2030-01-31 08:05"));
    }

    #[test]
    fn test_parse_expiry_rejects_garbage() {
        assert!(parse_expiry("31/01/2030", &Expiry::never()).unwrap_err().is_validation());
        assert!(parse_expiry("2030-02-30", &Expiry::never()).unwrap_err().is_validation());
        assert!(parse_expiry("2030-01-31 25:00", &Expiry::never()).unwrap_err().is_validation());
    }

    #[test]
    fn test_resolve_paths() {
        let tree = Tree::new("vault");
        assert_eq!(resolve_group(&tree, "").unwrap(), tree.root_id());
        assert!(resolve_node(&tree, "Missing").unwrap_err().is_not_found());
        assert!(resolve_entry(&tree, "").unwrap_err().is_not_found());
    }
}
