//! Persistence collaborators.
//!
//! # Responsibility
//! - Define the note-store, place-hierarchy and alias contracts the engines
//!   consume.
//! - Provide the SQLite note store and store-backed implementations.
//!
//! # Invariants
//! - Engines depend on the traits only; SQL stays inside `note_store`.
//! - Store APIs return semantic errors (`AlreadyExists`, `NotFound`) in
//!   addition to transport errors.

pub mod aliases;
pub mod note_store;
pub mod places;
pub mod reader;
pub mod schema;

pub use aliases::{AliasResolver, AliasTable, NoAliases};
pub use note_store::{
    NoteDocument, NoteKind, NoteStore, SqliteNoteStore, StoreError, StoreResult,
    RECORD_ID_PROPERTY,
};
pub use places::{PlaceHierarchy, PlaceNode, StorePlaceHierarchy};
pub use reader::load_graph;
