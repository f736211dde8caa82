//! Coffer - encrypted credential database engine
//!
//! This library implements the core of a password manager: a tree of groups
//! and entries kept in an encrypted database file, secret field values held
//! in protected memory, and a session that applies edits consistently and
//! tracks dirty state and undo history.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `crypto`: Key derivation, authenticated encryption and protected memory
//! - `models`: The node tree (groups, entries, fields, expiry, icons)
//! - `services`: Mutation engine, group editor protocol, date/icon selection
//! - `session`: The open database, its single writer and undo log
//! - `storage`: Encrypted file container, atomic writes and backups
//! - `audit`: Audit logging system
//! - `cli` / `display`: The `coffer` command-line front end
//!
//! # Example
//!
//! ```rust,ignore
//! use coffer::config::{CofferPaths, Settings};
//! use coffer::services::Operation;
//! use coffer::{SecureString, Session};
//!
//! let paths = CofferPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let session = Session::open(paths.default_database(), passphrase, settings.session_config(&paths))?;
//! let root = session.snapshot().root_id();
//! session.apply(Operation::CreateGroup { parent: root, info: GroupInfo::new("Work") })?;
//! session.save()?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod storage;

pub use crypto::SecureString;
pub use error::{CofferError, CofferResult, ErrorKind};
pub use session::Session;
