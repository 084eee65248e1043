//! Relationship type rules: symmetry, direction, ancestry participation and
//! the pairwise exclusion table.
//!
//! Everything here is a pure lookup over [`RelationshipType`]; no graph
//! state is consulted.

use crate::config::AncestryPolicy;
use crate::error::CoreError;
use crate::family_tree::model::{FamilyRelationship, RelationshipType};
use crate::types::Id;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Groups of relationship types that behave alike in the exclusion table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipCategory {
    /// `parent` / `child`.
    Lineage,
    /// `step_parent` / `step_child`.
    StepLineage,
    /// `adopted_child`.
    Adoptive,
    Spouse,
    Sibling,
}

/// How a new edge relates to an existing edge between the same pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRule {
    /// Both edges may coexist.
    Compatible,
    /// The pair may hold only one of the two.
    Conflicting,
    /// The new edge restates a symmetric edge that already exists.
    SameEdge,
}

type Cat = RelationshipCategory;

/// Pairwise rules between categories. Lookups are order-insensitive; pairs
/// not listed are [`PairRule::Compatible`].
const EXCLUSION_TABLE: &[(Cat, Cat, PairRule)] = &[
    (Cat::Lineage, Cat::Lineage, PairRule::Conflicting),
    (Cat::Lineage, Cat::Spouse, PairRule::Conflicting),
    (Cat::Lineage, Cat::Sibling, PairRule::Conflicting),
    (Cat::Lineage, Cat::StepLineage, PairRule::Conflicting),
    (Cat::Lineage, Cat::Adoptive, PairRule::Conflicting),
    (Cat::StepLineage, Cat::StepLineage, PairRule::Conflicting),
    (Cat::StepLineage, Cat::Spouse, PairRule::Conflicting),
    (Cat::StepLineage, Cat::Sibling, PairRule::Conflicting),
    (Cat::StepLineage, Cat::Adoptive, PairRule::Compatible),
    (Cat::Adoptive, Cat::Adoptive, PairRule::Conflicting),
    (Cat::Adoptive, Cat::Spouse, PairRule::Conflicting),
    (Cat::Adoptive, Cat::Sibling, PairRule::Conflicting),
    (Cat::Spouse, Cat::Sibling, PairRule::Conflicting),
    (Cat::Spouse, Cat::Spouse, PairRule::SameEdge),
    (Cat::Sibling, Cat::Sibling, PairRule::SameEdge),
];

pub fn category(kind: RelationshipType) -> RelationshipCategory {
    match kind {
        RelationshipType::Parent | RelationshipType::Child => RelationshipCategory::Lineage,
        RelationshipType::StepParent | RelationshipType::StepChild => {
            RelationshipCategory::StepLineage
        }
        RelationshipType::AdoptedChild => RelationshipCategory::Adoptive,
        RelationshipType::Spouse => RelationshipCategory::Spouse,
        RelationshipType::Sibling => RelationshipCategory::Sibling,
    }
}

/// Look up the rule between two relationship types.
pub fn pair_rule(existing: RelationshipType, requested: RelationshipType) -> PairRule {
    let (a, b) = (category(existing), category(requested));
    EXCLUSION_TABLE
        .iter()
        .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
        .map(|(_, _, rule)| *rule)
        .unwrap_or(PairRule::Compatible)
}

// ---------------------------------------------------------------------------
// Symmetry and direction
// ---------------------------------------------------------------------------

/// Symmetric kinds are stored once and read the same from either endpoint.
pub fn is_symmetric(kind: RelationshipType) -> bool {
    matches!(kind, RelationshipType::Spouse | RelationshipType::Sibling)
}

pub fn is_directional(kind: RelationshipType) -> bool {
    !is_symmetric(kind)
}

/// The kind that describes the same edge read from the other endpoint.
pub fn inverse(kind: RelationshipType) -> Option<RelationshipType> {
    match kind {
        RelationshipType::Parent => Some(RelationshipType::Child),
        RelationshipType::Child => Some(RelationshipType::Parent),
        RelationshipType::StepParent => Some(RelationshipType::StepChild),
        RelationshipType::StepChild => Some(RelationshipType::StepParent),
        RelationshipType::Spouse => Some(RelationshipType::Spouse),
        RelationshipType::Sibling => Some(RelationshipType::Sibling),
        // "adoptive parent" has no stored counterpart.
        RelationshipType::AdoptedChild => None,
    }
}

// ---------------------------------------------------------------------------
// Ancestry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineageKind {
    Biological,
    Step,
    Adoptive,
}

/// A directional edge normalised to parent → child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineageEdge {
    pub parent: Id,
    pub child: Id,
    pub kind: LineageKind,
}

/// Normalise a directional edge to parent → child. Symmetric kinds yield `None`.
pub fn lineage_of(kind: RelationshipType, from: Id, to: Id) -> Option<LineageEdge> {
    let (parent, child, kind) = match kind {
        RelationshipType::Parent => (from, to, LineageKind::Biological),
        RelationshipType::Child => (to, from, LineageKind::Biological),
        RelationshipType::StepParent => (from, to, LineageKind::Step),
        RelationshipType::StepChild => (to, from, LineageKind::Step),
        RelationshipType::AdoptedChild => (to, from, LineageKind::Adoptive),
        RelationshipType::Spouse | RelationshipType::Sibling => return None,
    };
    Some(LineageEdge {
        parent,
        child,
        kind,
    })
}

pub fn lineage_of_edge(rel: &FamilyRelationship) -> Option<LineageEdge> {
    lineage_of(rel.relationship_type, rel.from_member_id, rel.to_member_id)
}

/// Whether a lineage kind takes part in cycle checks and generation
/// inheritance under the given policy.
pub fn counts_as_ancestry(kind: LineageKind, policy: AncestryPolicy) -> bool {
    match kind {
        LineageKind::Biological => true,
        LineageKind::Step => policy.include_step,
        LineageKind::Adoptive => policy.include_adopted,
    }
}

/// The parent → child edge this relationship contributes to ancestry, if any.
pub fn ancestry_edge(rel: &FamilyRelationship, policy: AncestryPolicy) -> Option<LineageEdge> {
    lineage_of_edge(rel).filter(|edge| counts_as_ancestry(edge.kind, policy))
}

/// Same-generation constraint carried by symmetric kinds.
pub fn shares_generation(kind: RelationshipType) -> bool {
    is_symmetric(kind)
}

// ---------------------------------------------------------------------------
// Isolated checks
// ---------------------------------------------------------------------------

/// Structural check of a candidate edge ignoring graph state.
pub fn check_in_isolation(from: Id, to: Id) -> Result<(), CoreError> {
    if from == to {
        return Err(CoreError::SelfRelationship { member_id: from });
    }
    Ok(())
}
