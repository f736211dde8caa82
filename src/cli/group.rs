//! Group CLI commands
//!
//! Creation and edits go through the group editor so names are checked
//! against their siblings before anything is committed.

use clap::Subcommand;

use crate::display::format_children;
use crate::error::CofferResult;
use crate::models::IconImage;
use crate::services::{ChangeAction, DeletePolicy, EditAction, EditService, Operation};

use super::{parse_expiry, resolve_group, resolve_node, CliContext};

/// Group subcommands
#[derive(Subcommand)]
pub enum GroupCommands {
    /// List the contents of a group
    List {
        /// Group path (empty for the root)
        #[arg(default_value = "")]
        path: String,
    },
    /// Create a new group
    Create {
        /// Group name
        name: String,
        /// Parent group path
        #[arg(short, long, default_value = "")]
        parent: String,
        /// Notes
        #[arg(short, long)]
        notes: Option<String>,
        /// Standard icon number
        #[arg(short, long)]
        icon: Option<u32>,
        /// Expiry (YYYY-MM-DD or "YYYY-MM-DD HH:MM")
        #[arg(short, long)]
        expires: Option<String>,
    },
    /// Edit a group
    Edit {
        /// Group path
        path: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New notes
        #[arg(short, long)]
        notes: Option<String>,
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
    /// Move a group under another group
    Move {
        /// Group path
        path: String,
        /// Destination group path
        to: String,
    },
    /// Delete a group (to the recycle bin unless --permanent)
    Delete {
        /// Group path
        path: String,
        /// Remove it for good
        #[arg(long)]
        permanent: bool,
    },
    /// Restore a group from the recycle bin
    Restore {
        /// Path inside the recycle bin
        path: String,
    },
}

/// Handle a group command
pub fn handle_group_command(ctx: &CliContext, cmd: GroupCommands) -> CofferResult<()> {
    let session = ctx.open_session()?;
    let editor = EditService::new(&session);
    let tree = session.snapshot();

    match cmd {
        GroupCommands::List { path } => {
            let group = resolve_group(&tree, &path)?;
            print!("{}", format_children(&session.children_sorted(group)?));
            return Ok(());
        }

        GroupCommands::Create {
            name,
            parent,
            notes,
            icon,
            expires,
        } => {
            let action = EditAction::Creation {
                parent: resolve_group(&tree, &parent)?,
            };
            let mut info = editor.draft(action)?;
            info.title = name;
            info.notes = notes;
            if let Some(icon) = icon {
                info.icon = IconImage::Standard(icon);
            }
            if let Some(expires) = expires {
                info.expiry = parse_expiry(&expires, &info.expiry)?;
            }

            let record = editor.approve(action, info)?;
            println!("Created group: {}", record.title);
            println!("  ID: {}", record.node);
        }

        GroupCommands::Edit {
            path,
            name,
            notes,
            icon,
            expires,
            no_expiry,
        } => {
            let action = EditAction::Update {
                group: resolve_group(&tree, &path)?,
            };
            let mut info = editor.draft(action)?;
            let original = info.clone();

            if let Some(name) = name {
                info.title = name;
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

            if info == original {
                editor.cancel(action, info);
                println!("No changes specified. Use --name, --notes, --icon or --expires.");
                return Ok(());
            }
            let record = editor.approve(action, info)?;
            println!("Updated group: {}", record.title);
        }

        GroupCommands::Move { path, to } => {
            let record = session.apply(Operation::Reparent {
                node: resolve_group(&tree, &path)?,
                new_parent: resolve_group(&tree, &to)?,
            })?;
            println!("Moved group: {} -> /{}", record.title, to);
        }

        GroupCommands::Delete { path, permanent } => {
            let policy = if permanent {
                DeletePolicy::HardDelete
            } else {
                DeletePolicy::SoftDelete
            };
            let record = session.apply(Operation::Delete {
                node: resolve_group(&tree, &path)?,
                policy,
            })?;
            match record.action {
                ChangeAction::Trashed => println!("Moved group to recycle bin: {}", record.title),
                _ => println!("Deleted group: {}", record.title),
            }
        }

        GroupCommands::Restore { path } => {
            let record = session.apply(Operation::Restore {
                node: resolve_node(&tree, &path)?,
            })?;
            let restored = session.snapshot().path_of(record.node)?;
            println!("Restored group: {}", restored);
        }
    }

    session.save()
}
