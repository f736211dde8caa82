use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use coffer::cli::{
    handle_config_command, handle_entry_command, handle_group_command, handle_init_command,
    handle_log_command, handle_passphrase_command, handle_search_command, handle_tree_command,
    CliContext, EntryCommands, GroupCommands, PASSPHRASE_ENV,
};
use coffer::config::{CofferPaths, Settings};

#[derive(Parser)]
#[command(
    name = "coffer",
    version,
    about = "Encrypted credential database",
    long_about = "Coffer keeps passwords and other secrets in an encrypted database \
                  of groups and entries. Secrets stay masked in memory and only \
                  leave the database when you ask for them."
)]
struct Cli {
    /// Database file (defaults to data/vault.cdb in the data directory)
    #[arg(short, long, global = true, env = "COFFER_DATABASE")]
    database: Option<PathBuf>,

    /// Environment variable the passphrase is read from before prompting
    #[arg(long, global = true, value_name = "VAR", default_value = PASSPHRASE_ENV)]
    passphrase_env: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and create a database
    Init,

    /// Show configuration, or get/set one setting
    Config {
        /// Setting key (e.g. history_max_items)
        key: Option<String>,
        /// New value (JSON, or a bare word)
        value: Option<String>,
    },

    /// Print the group/entry tree
    Tree,

    /// Group management commands
    #[command(subcommand)]
    Group(GroupCommands),

    /// Entry management commands
    #[command(subcommand)]
    Entry(EntryCommands),

    /// Search entries by title, notes and plain fields
    Search {
        /// Text to look for (case-insensitive)
        query: String,
    },

    /// Change the database passphrase
    Passphrase {
        /// Environment variable the new passphrase is read from before prompting
        #[arg(long, value_name = "VAR", default_value = "COFFER_NEW_PASSPHRASE")]
        new_passphrase_env: String,
    },

    /// Show recent audit log entries
    Log {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("COFFER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let paths = CofferPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;
    let mut ctx = CliContext::new(paths, settings, cli.database, cli.passphrase_env);

    match cli.command {
        Some(Commands::Init) => handle_init_command(&ctx)?,
        Some(Commands::Config { key, value }) => handle_config_command(&mut ctx, key, value)?,
        Some(Commands::Tree) => handle_tree_command(&ctx)?,
        Some(Commands::Group(cmd)) => handle_group_command(&ctx, cmd)?,
        Some(Commands::Entry(cmd)) => handle_entry_command(&ctx, cmd)?,
        Some(Commands::Search { query }) => handle_search_command(&ctx, &query)?,
        Some(Commands::Passphrase { new_passphrase_env }) => {
            handle_passphrase_command(&ctx, &new_passphrase_env)?
        }
        Some(Commands::Log { limit }) => handle_log_command(&ctx, limit)?,
        None => {
            println!("Coffer - encrypted credential database");
            println!();
            println!("Run 'coffer --help' for usage information.");
            println!("Run 'coffer init' to create a database.");
        }
    }

    Ok(())
}
