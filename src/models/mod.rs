//! Core data models for Coffer
//!
//! This module contains the data structures of the credential database:
//! groups, entries, field values, expiry instants and the tree that ties
//! them together.

pub mod expiry;
pub mod field;
pub mod icon;
pub mod ids;
pub mod info;
pub mod node;
pub mod sort;
pub mod tree;

pub use expiry::{merge_date_components, merge_time_components, DateInstant, Expiry, InstantKind};
pub use field::{FieldValue, PASSWORD_FIELD, URL_FIELD, USERNAME_FIELD};
pub use icon::IconImage;
pub use ids::{CustomIconId, NodeId};
pub use info::{EntryInfo, GroupInfo};
pub use node::{Entry, EntrySnapshot, Group, Node, NodeBase, NodeKind};
pub use sort::{SortMethod, SortOptions};
pub use tree::Tree;
