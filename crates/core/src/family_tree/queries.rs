//! Read-only kinship queries over a [`FamilyTreeGraph`].
//!
//! Directional edges are read through their type, so a stored
//! "B child-of A" answers `parents_of(B)` with A. Symmetric edges are
//! visible from both endpoints.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::CoreError;
use crate::family_tree::model::{FamilyRelationship, RelationshipType};
use crate::family_tree::rules::{self, LineageKind};
use crate::family_tree::store::FamilyTreeGraph;
use crate::family_tree::validator;
use crate::types::Id;

/// A member related to the queried member through one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Relative {
    pub member_id: Id,
    pub relationship_id: Id,
    pub relationship_type: RelationshipType,
}

impl Relative {
    fn via(rel: &FamilyRelationship, member_id: Id) -> Self {
        Self {
            member_id,
            relationship_id: rel.id,
            relationship_type: rel.relationship_type,
        }
    }
}

impl FamilyTreeGraph {
    fn known(&self, member_id: Id) -> Result<(), CoreError> {
        if self.contains_member(member_id) {
            Ok(())
        } else {
            Err(CoreError::NotFound {
                entity: "FamilyMember",
                id: member_id,
            })
        }
    }

    fn lineage_relatives(
        &self,
        member_id: Id,
        upward: bool,
    ) -> Result<Vec<(Relative, LineageKind)>, CoreError> {
        self.known(member_id)?;
        Ok(self
            .relationships_of(member_id)
            .filter_map(|rel| {
                let edge = rules::lineage_of_edge(rel)?;
                let other = match (upward, edge.child == member_id) {
                    (true, true) => edge.parent,
                    (false, false) => edge.child,
                    _ => return None,
                };
                Some((Relative::via(rel, other), edge.kind))
            })
            .collect())
    }

    /// Parents of every kind: biological, step and adoptive.
    pub fn parents_of(&self, member_id: Id) -> Result<Vec<Relative>, CoreError> {
        Ok(self
            .lineage_relatives(member_id, true)?
            .into_iter()
            .map(|(relative, _)| relative)
            .collect())
    }

    /// Children of every kind: biological, step and adoptive.
    pub fn children_of(&self, member_id: Id) -> Result<Vec<Relative>, CoreError> {
        Ok(self
            .lineage_relatives(member_id, false)?
            .into_iter()
            .map(|(relative, _)| relative)
            .collect())
    }

    fn symmetric_relatives(
        &self,
        member_id: Id,
        kind: RelationshipType,
    ) -> Result<Vec<Relative>, CoreError> {
        self.known(member_id)?;
        Ok(self
            .relationships_of(member_id)
            .filter(|rel| rel.relationship_type == kind)
            .filter_map(|rel| rel.other_end(member_id).map(|other| Relative::via(rel, other)))
            .collect())
    }

    pub fn spouses_of(&self, member_id: Id) -> Result<Vec<Relative>, CoreError> {
        self.symmetric_relatives(member_id, RelationshipType::Spouse)
    }

    pub fn siblings_of(&self, member_id: Id) -> Result<Vec<Relative>, CoreError> {
        self.symmetric_relatives(member_id, RelationshipType::Sibling)
    }

    /// Transitive ancestors under the tree's ancestry policy, in member
    /// insertion order.
    pub fn ancestors_of(&self, member_id: Id) -> Result<Vec<Id>, CoreError> {
        self.known(member_id)?;
        let closure = validator::ancestor_closure(self, member_id, self.config().ancestry);
        Ok(self.in_insertion_order(&closure))
    }

    /// Transitive descendants under the tree's ancestry policy, in member
    /// insertion order.
    pub fn descendants_of(&self, member_id: Id) -> Result<Vec<Id>, CoreError> {
        self.known(member_id)?;
        let policy = self.config().ancestry;
        let mut seen = HashSet::new();
        let mut stack = vec![member_id];
        while let Some(current) = stack.pop() {
            for rel in self.relationships_of(current) {
                let Some(edge) = rules::ancestry_edge(rel, policy) else {
                    continue;
                };
                if edge.parent == current && seen.insert(edge.child) {
                    stack.push(edge.child);
                }
            }
        }
        Ok(self.in_insertion_order(&seen))
    }

    fn in_insertion_order(&self, ids: &HashSet<Id>) -> Vec<Id> {
        self.members()
            .map(|m| m.id)
            .filter(|id| ids.contains(id))
            .collect()
    }
}
