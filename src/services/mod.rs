//! Service layer for Coffer
//!
//! The service layer holds the logic between collaborators and the tree:
//! the mutation engine that edits it, the group edit protocol, and instant
//! and icon selection.

pub mod editor;
pub mod mutation;
pub mod selection;

pub use editor::{is_valid_group_name, EditAction, EditService, NameRejection, NameValidation};
pub use mutation::{ChangeAction, ChangeRecord, DeletePolicy, MutationEngine, Operation};
pub use selection::{
    await_selection, select_instant, InstantSelection, SelectionBroker, SelectionRequest,
    SelectionState,
};
