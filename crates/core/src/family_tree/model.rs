//! Family-tree entities: the tree, its members, their relationships and the
//! share settings that gate third-party access.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Date, Id, Timestamp, UserId};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

/// Relationship kinds.
///
/// Directional kinds read "from is the `<type>` of to": a `Child` edge from B
/// to A records that B is A's child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Parent,
    Child,
    Spouse,
    Sibling,
    AdoptedChild,
    StepParent,
    StepChild,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 7] = [
        RelationshipType::Parent,
        RelationshipType::Child,
        RelationshipType::Spouse,
        RelationshipType::Sibling,
        RelationshipType::AdoptedChild,
        RelationshipType::StepParent,
        RelationshipType::StepChild,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipType::Parent => "parent",
            RelationshipType::Child => "child",
            RelationshipType::Spouse => "spouse",
            RelationshipType::Sibling => "sibling",
            RelationshipType::AdoptedChild => "adopted_child",
            RelationshipType::StepParent => "step_parent",
            RelationshipType::StepChild => "step_child",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a member's generation value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationSource {
    /// Added to a tree that already had relationships; waiting for a
    /// resolver pass that connects it.
    #[default]
    Unresolved,
    /// Reference point of its connected component.
    Anchor,
    /// Propagated from the anchor along relationship edges.
    Derived,
    /// Set explicitly by the user; the resolver never changes it.
    Pinned,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Canvas placement. Generation 0 is the reference generation, negative
/// values are ancestors and positive values descendants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub generation: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSettings {
    pub is_shared: bool,
    pub allowed_users: BTreeSet<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

/// Tree-level record. Members and relationships are owned by the graph
/// that wraps this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyTree {
    pub id: Id,
    pub owner_id: UserId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Incremented on every committed mutation.
    pub version: u64,
    pub last_modified_by: UserId,
    pub share_settings: ShareSettings,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: Id,
    pub family_tree_id: Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_kana: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_death: Option<Date>,
    pub gender: Gender,
    pub is_alive: bool,
    /// Opaque reference resolved by the file-storage collaborator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub position: Position,
    /// True once the user placed the member explicitly; x/y are then left alone.
    pub manually_placed: bool,
    pub generation_source: GenerationSource,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FamilyMember {
    pub fn is_generation_pinned(&self) -> bool {
        self.generation_source == GenerationSource::Pinned
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRelationship {
    pub id: Id,
    pub family_tree_id: Id,
    pub from_member_id: Id,
    pub to_member_id: Id,
    pub relationship_type: RelationshipType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FamilyRelationship {
    /// Returns `true` if the edge touches `member_id` at either end.
    pub fn involves(&self, member_id: Id) -> bool {
        self.from_member_id == member_id || self.to_member_id == member_id
    }

    /// The endpoint opposite `member_id`, if the edge touches it.
    pub fn other_end(&self, member_id: Id) -> Option<Id> {
        if self.from_member_id == member_id {
            Some(self.to_member_id)
        } else if self.to_member_id == member_id {
            Some(self.from_member_id)
        } else {
            None
        }
    }

    /// Returns `true` if the edge connects exactly this unordered pair.
    pub fn connects(&self, a: Id, b: Id) -> bool {
        (self.from_member_id == a && self.to_member_id == b)
            || (self.from_member_id == b && self.to_member_id == a)
    }
}
