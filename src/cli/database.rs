//! Database-level CLI commands
//!
//! Initialization, settings, whole-tree views, search, passphrase changes and
//! the audit log.

use crate::audit::AuditLogger;
use crate::display::{format_search_results, format_tree};
use crate::error::{CofferError, CofferResult};
use crate::session::Session;

use super::{read_new_passphrase, CliContext};

/// Create the data directories, the settings file and an empty database
pub fn handle_init_command(ctx: &CliContext) -> CofferResult<()> {
    ctx.paths.ensure_directories()?;
    if !ctx.paths.is_initialized() {
        ctx.settings.save(&ctx.paths)?;
    }

    if ctx.database.exists() {
        println!("Database already exists: {}", ctx.database.display());
        return Ok(());
    }

    let passphrase = read_new_passphrase(&ctx.passphrase_env)?;
    println!("Deriving encryption key...");
    let session = Session::create(&ctx.database, passphrase, ctx.session_config())?;

    println!("Created database: {}", session.path().display());
    println!();
    println!("Run 'coffer group create <name>' to add your first group.");
    Ok(())
}

/// Show paths and settings, or change one setting
pub fn handle_config_command(ctx: &mut CliContext, key: Option<String>, value: Option<String>) -> CofferResult<()> {
    match (key, value) {
        (Some(key), Some(value)) => {
            ctx.settings.set(&key, &value)?;
            ctx.settings.save(&ctx.paths)?;
            println!("Set {} = {}", key, value);
        }
        (Some(key), None) => {
            let settings = serde_json::to_value(&ctx.settings)?;
            match settings.get(&key) {
                Some(current) => println!("{} = {}", key, current),
                None => return Err(CofferError::Config(format!("Unknown setting: {}", key))),
            }
        }
        _ => {
            println!("Coffer Configuration");
            println!("====================");
            println!("Base directory:   {}", ctx.paths.base_dir().display());
            println!("Database:         {}", ctx.database.display());
            println!("Backup directory: {}", ctx.paths.backup_dir().display());
            println!("Audit log:        {}", ctx.paths.audit_log().display());
            println!();
            println!("Settings:");
            println!("{}", serde_json::to_string_pretty(&ctx.settings)?);
        }
    }
    Ok(())
}

/// Print the whole tree
pub fn handle_tree_command(ctx: &CliContext) -> CofferResult<()> {
    let session = ctx.open_session()?;
    print!("{}", format_tree(&session.snapshot(), &session.config().sort));
    Ok(())
}

/// Search entries by title, notes and plain fields
pub fn handle_search_command(ctx: &CliContext, query: &str) -> CofferResult<()> {
    let session = ctx.open_session()?;
    let tree = session.snapshot();
    let hits = tree.search(query);
    print!("{}", format_search_results(&tree, &hits));
    Ok(())
}

/// Re-key the database with a new passphrase
pub fn handle_passphrase_command(ctx: &CliContext, new_passphrase_env: &str) -> CofferResult<()> {
    let session = ctx.open_session()?;
    let passphrase = read_new_passphrase(new_passphrase_env)?;
    println!("Deriving encryption key...");
    session.change_passphrase(passphrase)?;
    println!("Passphrase changed.");
    Ok(())
}

/// Print the most recent audit entries
pub fn handle_log_command(ctx: &CliContext, limit: usize) -> CofferResult<()> {
    let logger = AuditLogger::new(ctx.paths.audit_log());
    let entries = logger.read_recent(limit)?;
    if entries.is_empty() {
        println!("Audit log is empty.");
        return Ok(());
    }
    for entry in entries {
        println!("{}", entry.format_human_readable());
    }
    Ok(())
}
