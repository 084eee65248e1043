//! Family-tree relationship graph for the ending-note application.
//!
//! Pure domain logic: the graph store, relationship rules, consistency
//! validation, generation layout and share-access evaluation. Storage and
//! transport live outside this crate; callers hand in identifiers and request
//! payloads and get back validated snapshots or a [`error::CoreError`].

pub mod config;
pub mod error;
pub mod family_tree;
pub mod types;
