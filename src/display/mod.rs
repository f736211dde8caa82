//! Display formatting for terminal output
//!
//! Provides utilities for formatting the node tree for terminal display,
//! including tree views, tables and entry details.

pub mod node;

pub use node::{format_children, format_entry_details, format_history, format_search_results, format_tree};
