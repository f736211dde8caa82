//! Storage layer for Coffer
//!
//! Provides the on-disk pieces of a database: atomic JSON writes, the
//! encrypted container, the serialized tree inside it, and rolling backups
//! of the container file.

pub mod backup;
pub mod database;
pub mod document;
pub mod file_io;

pub use backup::{BackupInfo, BackupManager};
pub use database::{DatabaseFile, FORMAT_NAME, FORMAT_VERSION};
pub use document::TreeDocument;
pub use file_io::{read_json_required, write_json_atomic};
