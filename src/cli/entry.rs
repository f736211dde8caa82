//! Entry CLI commands
//!
//! Implements CLI commands for entry management. Protected values are only
//! printed by `show --reveal` and `copy`, and `copy` obeys the copy policy.

use clap::Subcommand;

use crate::display::{format_entry_details, format_history};
use crate::error::{CofferError, CofferResult};
use crate::models::{EntryInfo, FieldValue, IconImage, PASSWORD_FIELD, URL_FIELD, USERNAME_FIELD};
use crate::services::{ChangeAction, DeletePolicy, Operation};

use super::{parse_expiry, read_passphrase, resolve_entry, resolve_group, resolve_node, CliContext};

/// Variable holding an entry password for `--password-prompt`
const ENTRY_PASSWORD_ENV: &str = "COFFER_ENTRY_PASSWORD";

/// Entry subcommands
#[derive(Subcommand)]
pub enum EntryCommands {
    /// Add a new entry
    Add {
        /// Entry title
        title: String,
        /// Group path
        #[arg(short, long, default_value = "")]
        group: String,
        /// User name
        #[arg(short, long)]
        username: Option<String>,
        /// Password
        #[arg(short, long, conflicts_with = "password_prompt")]
        password: Option<String>,
        /// Ask for the password with hidden input
        #[arg(long)]
        password_prompt: bool,
        /// URL
        #[arg(long)]
        url: Option<String>,
        /// Notes
        #[arg(short, long)]
        notes: Option<String>,
        /// Extra field as NAME=VALUE (repeatable)
        #[arg(short, long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
        /// Standard icon number
        #[arg(short, long)]
        icon: Option<u32>,
        /// Expiry (YYYY-MM-DD or "YYYY-MM-DD HH:MM")
        #[arg(short, long)]
        expires: Option<String>,
    },
    /// Show an entry
    Show {
        /// Entry path
        path: String,
        /// Print protected values in the clear
        #[arg(long)]
        reveal: bool,
    },
    /// Edit an entry; the previous state goes to its history
    Edit {
        /// Entry path
        path: String,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// User name
        #[arg(short, long)]
        username: Option<String>,
        /// Password
        #[arg(short, long, conflicts_with = "password_prompt")]
        password: Option<String>,
        /// Ask for the password with hidden input
        #[arg(long)]
        password_prompt: bool,
        /// URL
        #[arg(long)]
        url: Option<String>,
        /// Notes
        #[arg(short, long)]
        notes: Option<String>,
        /// Set a field as NAME=VALUE (repeatable)
        #[arg(short, long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
        /// Remove a field (repeatable)
        #[arg(long = "remove-field", value_name = "NAME")]
        remove_fields: Vec<String>,
        /// Standard icon number
        #[arg(short, long)]
        icon: Option<u32>,
        /// Expiry (YYYY-MM-DD or "YYYY-MM-DD HH:MM")
        #[arg(short, long, conflicts_with = "no_expiry")]
        expires: Option<String>,
        /// Switch expiry off
        #[arg(long)]
        no_expiry: bool,
    },
    /// Show earlier versions of an entry
    History {
        /// Entry path
        path: String,
    },
    /// Move an entry to another group
    Move {
        /// Entry path
        path: String,
        /// Destination group path
        to: String,
    },
    /// Delete an entry (to the recycle bin unless --permanent)
    Delete {
        /// Entry path
        path: String,
        /// Remove it for good
        #[arg(long)]
        permanent: bool,
    },
    /// Restore an entry from the recycle bin
    Restore {
        /// Path inside the recycle bin
        path: String,
    },
    /// Print one field, e.g. to pipe into a clipboard tool
    Copy {
        /// Entry path
        path: String,
        /// Field name
        #[arg(short, long, default_value = PASSWORD_FIELD)]
        field: String,
    },
}

/// Changes shared by `add` and `edit`
struct FieldEdits {
    username: Option<String>,
    password: Option<String>,
    password_prompt: bool,
    url: Option<String>,
    fields: Vec<String>,
}

impl FieldEdits {
    fn apply_to(self, info: &mut EntryInfo) -> CofferResult<()> {
        if let Some(username) = self.username {
            info.set_field(USERNAME_FIELD, FieldValue::plain(username));
        }
        if let Some(url) = self.url {
            info.set_field(URL_FIELD, FieldValue::plain(url));
        }
        if self.password_prompt {
            let password = read_passphrase(ENTRY_PASSWORD_ENV, "Entry password: ")?;
            info.set_field(PASSWORD_FIELD, FieldValue::protected(password));
        } else if let Some(password) = self.password {
            info.set_field(PASSWORD_FIELD, FieldValue::plain(password));
        }
        for raw in &self.fields {
            let (name, value) = parse_field(raw)?;
            info.set_field(name, FieldValue::plain(value));
        }
        Ok(())
    }
}

/// Split "NAME=VALUE"; the value may itself contain '='
fn parse_field(raw: &str) -> CofferResult<(&str, &str)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => Err(CofferError::Validation(format!(
            "Invalid field: '{}'. Use NAME=VALUE",
            raw
        ))),
    }
}

/// Handle an entry command
pub fn handle_entry_command(ctx: &CliContext, cmd: EntryCommands) -> CofferResult<()> {
    let session = ctx.open_session()?;
    let tree = session.snapshot();

    match cmd {
        EntryCommands::Add {
            title,
            group,
            username,
            password,
            password_prompt,
            url,
            notes,
            fields,
            icon,
            expires,
        } => {
            let parent = resolve_group(&tree, &group)?;
            let mut info = EntryInfo::new(title);
            info.notes = notes;
            if let Some(icon) = icon {
                info.icon = IconImage::Standard(icon);
            }
            if let Some(expires) = expires {
                info.expiry = parse_expiry(&expires, &info.expiry)?;
            }
            FieldEdits {
                username,
                password,
                password_prompt,
                url,
                fields,
            }
            .apply_to(&mut info)?;

            let record = session.apply(Operation::CreateEntry { parent, info })?;
            println!("Created entry: {}", record.title);
            println!("  ID: {}", record.node);
        }

        EntryCommands::Show { path, reveal } => {
            let id = resolve_entry(&tree, &path)?;
            let entry = tree
                .entry(id)
                .ok_or_else(|| CofferError::entry_not_found(&path))?;
            let details = format_entry_details(&path, entry, |name| {
                if !reveal {
                    return None;
                }
                session
                    .with_protected_field(id, name, |bytes| String::from_utf8_lossy(bytes).into_owned())
                    .ok()
            });
            print!("{}", details);
            return Ok(());
        }

        EntryCommands::Edit {
            path,
            title,
            username,
            password,
            password_prompt,
            url,
            notes,
            fields,
            remove_fields,
            icon,
            expires,
            no_expiry,
        } => {
            let id = resolve_entry(&tree, &path)?;
            let entry = tree
                .entry(id)
                .ok_or_else(|| CofferError::entry_not_found(&path))?;
            let mut info = EntryInfo::from_entry(entry);
            let original = info.clone();

            if let Some(title) = title {
                info.title = title;
            }
            if let Some(notes) = notes {
                info.notes = Some(notes);
            }
            if let Some(icon) = icon {
                info.icon = IconImage::Standard(icon);
            }
            if let Some(expires) = expires {
                info.expiry = parse_expiry(&expires, &info.expiry)?;
            }
            if no_expiry {
                info.expiry.enabled = false;
            }
            FieldEdits {
                username,
                password,
                password_prompt,
                url,
                fields,
            }
            .apply_to(&mut info)?;
            for name in &remove_fields {
                if !info.remove_field(name) {
                    return Err(CofferError::field_not_found(name));
                }
            }

            if info == original {
                println!("No changes specified.");
                return Ok(());
            }
            let record = session.apply(Operation::UpdateEntry { id, info })?;
            println!("Updated entry: {}", record.title);
        }

        EntryCommands::History { path } => {
            let id = resolve_entry(&tree, &path)?;
            let entry = tree
                .entry(id)
                .ok_or_else(|| CofferError::entry_not_found(&path))?;
            print!("{}", format_history(entry));
            return Ok(());
        }

        EntryCommands::Move { path, to } => {
            let record = session.apply(Operation::Reparent {
                node: resolve_entry(&tree, &path)?,
                new_parent: resolve_group(&tree, &to)?,
            })?;
            println!("Moved entry: {} -> /{}", record.title, to);
        }

        EntryCommands::Delete { path, permanent } => {
            let policy = if permanent {
                DeletePolicy::HardDelete
            } else {
                DeletePolicy::SoftDelete
            };
            let record = session.apply(Operation::Delete {
                node: resolve_entry(&tree, &path)?,
                policy,
            })?;
            match record.action {
                ChangeAction::Trashed => println!("Moved entry to recycle bin: {}", record.title),
                _ => println!("Deleted entry: {}", record.title),
            }
        }

        EntryCommands::Restore { path } => {
            let record = session.apply(Operation::Restore {
                node: resolve_node(&tree, &path)?,
            })?;
            let restored = session.snapshot().path_of(record.node)?;
            println!("Restored entry: {}", restored);
        }

        EntryCommands::Copy { path, field } => {
            let id = resolve_entry(&tree, &path)?;
            let value = session.copy_protected_field(id, &field)?;
            println!("{}", value.as_str());
            return Ok(());
        }
    }

    session.save()
}
