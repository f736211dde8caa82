//! Configuration module for Coffer
//!
//! This module provides configuration management including:
//! - Path resolution for config, databases, backups and the audit log
//! - User settings persistence
//! - The explicit per-session configuration derived from settings

pub mod paths;
pub mod session;
pub mod settings;

pub use paths::CofferPaths;
pub use session::{KdfCost, SessionConfig};
pub use settings::Settings;
