//! Audit logging system for Coffer
//!
//! Records every change applied to a database in an append-only audit log.
//! Entries hold metadata (operation, node id, title, parent) and never field
//! values, so the log is safe to keep next to the encrypted database.
//!
//! # Architecture
//!
//! - `AuditEntry`: one log line with timestamp, operation and entity
//!   information.
//! - `AuditLogger`: writes entries to the log file using line-delimited JSON
//!   (JSONL).
//!
//! # Example
//!
//! ```rust,ignore
//! use coffer::audit::{AuditEntry, AuditLogger};
//!
//! let logger = AuditLogger::new(audit_log_path);
//! let record = session.apply(operation)?;
//! logger.log(&AuditEntry::from_change(&record))?;
//! ```

mod entry;
mod logger;

pub use entry::{AuditEntry, AuditOperation, EntityType};
pub use logger::AuditLogger;
