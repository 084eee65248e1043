//! Family-tree relationship graph.
//!
//! [`store::FamilyTreeGraph`] holds one tree and exposes the validated
//! mutation primitives. [`registry::FamilyTreeRegistry`] owns every tree,
//! serialises writers per tree and applies the share gate.

pub mod generation;
pub mod model;
pub mod queries;
pub mod registry;
pub mod requests;
pub mod rules;
pub mod share;
pub mod store;
pub mod transfer;
pub mod validator;

pub use generation::GenerationConflict;
pub use model::{
    FamilyMember, FamilyRelationship, FamilyTree, Gender, GenerationSource, Position,
    RelationshipType, ShareSettings,
};
pub use registry::{FamilyTreeRegistry, TreeUpdate};
pub use share::{AccessLevel, Bearer};
pub use store::{EntityChanges, FamilyTreeGraph, FamilyTreeSnapshot, Mutation};
pub use transfer::{FamilyTreeExport, ImportReport};
