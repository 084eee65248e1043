//! In-memory graph of one family tree.
//!
//! Every mutation works on copies and commits only after all checks pass, so
//! a failed call leaves the graph untouched. A committed mutation bumps the
//! tree version and runs the generation resolver over the touched components.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::FamilyTreeConfig;
use crate::error::CoreError;
use crate::family_tree::generation::{self, GenerationConflict};
use crate::family_tree::model::{
    FamilyMember, FamilyRelationship, FamilyTree, GenerationSource, Position, ShareSettings,
};
use crate::family_tree::requests::{
    check_life_dates, check_period, AddFamilyMemberRequest, AddFamilyRelationshipRequest,
    CreateFamilyTreeRequest, UpdateFamilyMemberRequest, UpdateFamilyRelationshipRequest,
    UpdateFamilyTreeRequest,
};
use crate::family_tree::validator::{self, Admission, Candidate, MemberDirectory};
use crate::types::{new_id, Id, Timestamp, UserId};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of a committed mutation: the affected value plus any
/// non-blocking generation conflicts found while re-resolving.
#[derive(Debug, Clone)]
pub struct Mutation<T> {
    pub value: T,
    pub warnings: Vec<GenerationConflict>,
    /// Members and relationships the mutation created or deleted.
    pub changes: EntityChanges,
}

impl<T> Mutation<T> {
    /// A mutation that created and deleted nothing.
    pub fn new(value: T, warnings: Vec<GenerationConflict>) -> Self {
        Self {
            value,
            warnings,
            changes: EntityChanges::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityChanges {
    pub added_members: Vec<Id>,
    pub removed_members: Vec<Id>,
    pub added_relationships: Vec<Id>,
    pub removed_relationships: Vec<Id>,
}

impl EntityChanges {
    pub fn is_empty(&self) -> bool {
        self.added_members.is_empty()
            && self.removed_members.is_empty()
            && self.added_relationships.is_empty()
            && self.removed_relationships.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovedMember {
    pub member: FamilyMember,
    /// Relationships removed along with the member.
    pub relationships: Vec<FamilyRelationship>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipChange {
    pub relationship: FamilyRelationship,
    /// True when the request restated an existing symmetric edge and was
    /// folded into it instead of creating a new one.
    pub merged: bool,
}

/// Full tree state handed back to callers after every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyTreeSnapshot {
    #[serde(flatten)]
    pub tree: FamilyTree,
    pub members: Vec<FamilyMember>,
    pub relationships: Vec<FamilyRelationship>,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FamilyTreeGraph {
    tree: FamilyTree,
    members: HashMap<Id, FamilyMember>,
    /// Member ids in insertion order; the first entry is the default anchor.
    member_order: Vec<Id>,
    relationships: BTreeMap<Id, FamilyRelationship>,
    /// Member id -> ids of every relationship naming it, at either end.
    adjacency: HashMap<Id, BTreeSet<Id>>,
    config: FamilyTreeConfig,
}

impl FamilyTreeGraph {
    /// Create an empty tree owned by `owner`.
    pub fn create(
        owner: UserId,
        req: CreateFamilyTreeRequest,
        config: FamilyTreeConfig,
    ) -> Result<Self, CoreError> {
        req.check()?;
        let now = chrono::Utc::now();
        let tree = FamilyTree {
            id: new_id(),
            last_modified_by: owner.clone(),
            owner_id: owner,
            name: req.name.trim().to_string(),
            description: req.description,
            version: 1,
            share_settings: ShareSettings::default(),
            created_at: now,
            updated_at: now,
        };
        tracing::info!(tree_id = %tree.id, owner = %tree.owner_id, "Family tree created");
        Ok(Self {
            tree,
            members: HashMap::new(),
            member_order: Vec::new(),
            relationships: BTreeMap::new(),
            adjacency: HashMap::new(),
            config,
        })
    }

    // -- accessors ----------------------------------------------------------

    pub fn id(&self) -> Id {
        self.tree.id
    }

    pub fn tree(&self) -> &FamilyTree {
        &self.tree
    }

    pub fn version(&self) -> u64 {
        self.tree.version
    }

    pub fn config(&self) -> &FamilyTreeConfig {
        &self.config
    }

    pub fn member(&self, id: Id) -> Option<&FamilyMember> {
        self.members.get(&id)
    }

    pub fn contains_member(&self, id: Id) -> bool {
        self.members.contains_key(&id)
    }

    pub fn relationship(&self, id: Id) -> Option<&FamilyRelationship> {
        self.relationships.get(&id)
    }

    /// Members in insertion order.
    pub fn members(&self) -> impl Iterator<Item = &FamilyMember> + '_ {
        self.member_order.iter().filter_map(|id| self.members.get(id))
    }

    pub fn relationships(&self) -> impl Iterator<Item = &FamilyRelationship> + '_ {
        self.relationships.values()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Every relationship naming `member_id` at either end.
    pub fn relationships_of(&self, member_id: Id) -> impl Iterator<Item = &FamilyRelationship> + '_ {
        self.adjacency
            .get(&member_id)
            .into_iter()
            .flatten()
            .filter_map(|rel_id| self.relationships.get(rel_id))
    }

    /// Relationships connecting the unordered pair `a`, `b`.
    pub fn relationships_between(
        &self,
        a: Id,
        b: Id,
    ) -> impl Iterator<Item = &FamilyRelationship> + '_ {
        self.relationships_of(a).filter(move |rel| rel.connects(a, b))
    }

    pub fn snapshot(&self) -> FamilyTreeSnapshot {
        FamilyTreeSnapshot {
            tree: self.tree.clone(),
            members: self.members().cloned().collect(),
            relationships: self.relationships().cloned().collect(),
        }
    }

    fn require_member(&self, id: Id) -> Result<&FamilyMember, CoreError> {
        self.members.get(&id).ok_or(CoreError::NotFound {
            entity: "FamilyMember",
            id,
        })
    }

    fn require_relationship(&self, id: Id) -> Result<&FamilyRelationship, CoreError> {
        self.relationships.get(&id).ok_or(CoreError::NotFound {
            entity: "FamilyRelationship",
            id,
        })
    }

    pub(crate) fn member_mut(&mut self, id: Id) -> Option<&mut FamilyMember> {
        self.members.get_mut(&id)
    }

    /// Record a committed mutation on the tree record.
    fn touch(&mut self, actor: &UserId, now: Timestamp) {
        self.tree.version += 1;
        self.tree.last_modified_by = actor.clone();
        self.tree.updated_at = now;
    }

    fn index_relationship(&mut self, rel: FamilyRelationship) {
        for end in [rel.from_member_id, rel.to_member_id] {
            self.adjacency.entry(end).or_default().insert(rel.id);
        }
        self.relationships.insert(rel.id, rel);
    }

    fn unindex_relationship(&mut self, rel_id: Id) -> Option<FamilyRelationship> {
        let rel = self.relationships.remove(&rel_id)?;
        for end in [rel.from_member_id, rel.to_member_id] {
            if let Some(ids) = self.adjacency.get_mut(&end) {
                ids.remove(&rel_id);
                if ids.is_empty() {
                    self.adjacency.remove(&end);
                }
            }
        }
        Some(rel)
    }

    // -- tree ---------------------------------------------------------------

    pub fn update_tree(
        &mut self,
        actor: &UserId,
        req: UpdateFamilyTreeRequest,
    ) -> Result<FamilyTree, CoreError> {
        req.check()?;
        if let Some(name) = req.name {
            self.tree.name = name.trim().to_string();
        }
        if let Some(description) = req.description {
            self.tree.description = description;
        }
        self.touch(actor, chrono::Utc::now());
        tracing::info!(tree_id = %self.tree.id, version = self.tree.version, "Family tree updated");
        Ok(self.tree.clone())
    }

    pub(crate) fn replace_share_settings(&mut self, actor: &UserId, settings: ShareSettings) {
        self.tree.share_settings = settings;
        self.touch(actor, chrono::Utc::now());
    }

    // -- members ------------------------------------------------------------

    pub fn add_member(
        &mut self,
        actor: &UserId,
        req: AddFamilyMemberRequest,
    ) -> Result<Mutation<FamilyMember>, CoreError> {
        self.add_member_seeded(actor, req, None)
    }

    /// Add a member whose unpinned generation starts at `seed` instead of 0.
    /// An explicit generation in the request still pins.
    pub(crate) fn add_member_seeded(
        &mut self,
        actor: &UserId,
        req: AddFamilyMemberRequest,
        seed: Option<(i32, GenerationSource)>,
    ) -> Result<Mutation<FamilyMember>, CoreError> {
        req.check()?;
        let now = chrono::Utc::now();
        let is_alive = req.resolved_is_alive();
        let placement = req.position.unwrap_or_default();

        let (generation, generation_source) = match (placement.generation, seed) {
            (Some(generation), _) => (generation, GenerationSource::Pinned),
            (None, Some((generation, GenerationSource::Pinned))) => {
                (generation, GenerationSource::Unresolved)
            }
            (None, Some(seeded)) => seeded,
            (None, None) if self.relationships.is_empty() => (0, GenerationSource::Anchor),
            (None, None) => (0, GenerationSource::Unresolved),
        };

        let member = FamilyMember {
            id: new_id(),
            family_tree_id: self.tree.id,
            name: req.name.trim().to_string(),
            name_kana: req.name_kana,
            date_of_birth: req.date_of_birth,
            date_of_death: req.date_of_death,
            gender: req.gender,
            is_alive,
            profile_photo: req.profile_photo,
            notes: req.notes,
            position: Position {
                x: 0.0,
                y: 0.0,
                generation,
            },
            manually_placed: false,
            generation_source,
            created_at: now,
            updated_at: now,
        };
        let id = member.id;
        self.members.insert(id, member);
        self.member_order.push(id);

        generation::apply_default_positions(self, &[id]);
        if placement.places_manually() {
            if let Some(member) = self.members.get_mut(&id) {
                member.manually_placed = true;
                member.position.x = placement.x.unwrap_or(member.position.x);
                member.position.y = placement.y.unwrap_or(member.position.y);
            }
        }

        let warnings = generation::resolve(self, &[id]);
        self.touch(actor, now);
        tracing::info!(
            tree_id = %self.tree.id,
            member_id = %id,
            version = self.tree.version,
            "Family member added"
        );
        let value = self.require_member(id)?.clone();
        Ok(Mutation {
            value,
            warnings,
            changes: EntityChanges {
                added_members: vec![id],
                ..Default::default()
            },
        })
    }

    pub fn update_member(
        &mut self,
        actor: &UserId,
        member_id: Id,
        req: UpdateFamilyMemberRequest,
    ) -> Result<Mutation<FamilyMember>, CoreError> {
        req.check()?;
        let mut member = self.require_member(member_id)?.clone();

        if let Some(tree_id) = req.family_tree_id {
            if tree_id != member.family_tree_id {
                return Err(CoreError::Validation(
                    "A member cannot be moved to another family tree".to_string(),
                ));
            }
        }

        if let Some(name) = req.name {
            member.name = name.trim().to_string();
        }
        if let Some(name_kana) = req.name_kana {
            member.name_kana = name_kana;
        }
        if let Some(date_of_birth) = req.date_of_birth {
            member.date_of_birth = date_of_birth;
        }
        if let Some(date_of_death) = req.date_of_death {
            if date_of_death.is_some() && req.is_alive.is_none() {
                member.is_alive = false;
            }
            member.date_of_death = date_of_death;
        }
        if let Some(gender) = req.gender {
            member.gender = gender;
        }
        if let Some(is_alive) = req.is_alive {
            member.is_alive = is_alive;
        }
        if let Some(profile_photo) = req.profile_photo {
            member.profile_photo = profile_photo;
        }
        if let Some(notes) = req.notes {
            member.notes = notes;
        }
        check_life_dates(member.is_alive, member.date_of_birth, member.date_of_death)?;

        let before = (member.position.generation, member.generation_source);
        if let Some(placement) = req.position {
            if placement.places_manually() {
                member.manually_placed = true;
                member.position.x = placement.x.unwrap_or(member.position.x);
                member.position.y = placement.y.unwrap_or(member.position.y);
            }
            if let Some(generation) = placement.generation {
                member.position.generation = generation;
                member.generation_source = GenerationSource::Pinned;
            }
        }
        if req.unpin_generation && member.is_generation_pinned() {
            member.generation_source = GenerationSource::Unresolved;
        }
        if req.reset_placement {
            member.manually_placed = false;
        }
        let generation_changed = before != (member.position.generation, member.generation_source);

        let now = chrono::Utc::now();
        member.updated_at = now;
        self.members.insert(member_id, member);

        let mut warnings = Vec::new();
        if generation_changed || req.reset_placement {
            generation::apply_default_positions(self, &[member_id]);
            warnings = generation::resolve(self, &[member_id]);
        }
        self.touch(actor, now);
        tracing::info!(
            tree_id = %self.tree.id,
            member_id = %member_id,
            version = self.tree.version,
            "Family member updated"
        );
        let value = self.require_member(member_id)?.clone();
        Ok(Mutation::new(value, warnings))
    }

    /// Remove a member and every relationship naming it.
    pub fn remove_member(
        &mut self,
        actor: &UserId,
        member_id: Id,
    ) -> Result<Mutation<RemovedMember>, CoreError> {
        self.require_member(member_id)?;

        let rel_ids: Vec<Id> = self
            .adjacency
            .get(&member_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        let mut removed = Vec::with_capacity(rel_ids.len());
        let mut neighbours = Vec::new();
        for rel_id in rel_ids {
            if let Some(rel) = self.unindex_relationship(rel_id) {
                if let Some(other) = rel.other_end(member_id) {
                    neighbours.push(other);
                }
                removed.push(rel);
            }
        }

        let member = self
            .members
            .remove(&member_id)
            .ok_or_else(|| {
                CoreError::Internal(format!("member {member_id} vanished during removal"))
            })?;
        self.member_order.retain(|id| *id != member_id);
        self.adjacency.remove(&member_id);

        let warnings = generation::resolve(self, &neighbours);
        self.touch(actor, chrono::Utc::now());
        tracing::info!(
            tree_id = %self.tree.id,
            member_id = %member_id,
            cascaded = removed.len(),
            version = self.tree.version,
            "Family member removed"
        );
        let changes = EntityChanges {
            removed_members: vec![member_id],
            removed_relationships: removed.iter().map(|rel| rel.id).collect(),
            ..Default::default()
        };
        Ok(Mutation {
            value: RemovedMember {
                member,
                relationships: removed,
            },
            warnings,
            changes,
        })
    }

    // -- relationships ------------------------------------------------------

    /// Validate and record a relationship.
    ///
    /// `directory` tells the validator which tree owns members this graph
    /// does not contain, so foreign members surface as cross-tree references.
    pub fn add_relationship(
        &mut self,
        actor: &UserId,
        req: AddFamilyRelationshipRequest,
        directory: &dyn MemberDirectory,
    ) -> Result<Mutation<RelationshipChange>, CoreError> {
        req.check()?;
        let candidate = Candidate {
            from: req.from_member_id,
            to: req.to_member_id,
            kind: req.relationship_type,
        };
        let admission = validator::validate_relationship(self, &candidate, directory, None)?;
        let now = chrono::Utc::now();

        let (relationship, merged) = match admission {
            Admission::Insert => {
                let rel = FamilyRelationship {
                    id: new_id(),
                    family_tree_id: self.tree.id,
                    from_member_id: req.from_member_id,
                    to_member_id: req.to_member_id,
                    relationship_type: req.relationship_type,
                    start_date: req.start_date,
                    end_date: req.end_date,
                    notes: req.notes,
                    created_at: now,
                    updated_at: now,
                };
                self.index_relationship(rel.clone());
                (rel, false)
            }
            Admission::Merge(existing_id) => {
                let mut rel = self.require_relationship(existing_id)?.clone();
                if req.start_date.is_some() {
                    rel.start_date = req.start_date;
                }
                if req.end_date.is_some() {
                    rel.end_date = req.end_date;
                }
                if req.notes.is_some() {
                    rel.notes = req.notes;
                }
                check_period(rel.start_date, rel.end_date)?;
                rel.updated_at = now;
                self.relationships.insert(existing_id, rel.clone());
                (rel, true)
            }
        };

        let warnings =
            generation::resolve(self, &[relationship.from_member_id, relationship.to_member_id]);
        self.touch(actor, now);
        tracing::info!(
            tree_id = %self.tree.id,
            relationship_id = %relationship.id,
            relationship_type = %relationship.relationship_type,
            merged,
            version = self.tree.version,
            "Family relationship recorded"
        );
        let changes = EntityChanges {
            added_relationships: if merged { Vec::new() } else { vec![relationship.id] },
            ..Default::default()
        };
        Ok(Mutation {
            value: RelationshipChange {
                relationship,
                merged,
            },
            warnings,
            changes,
        })
    }

    /// Change the type, dates or notes of a relationship. A type change is
    /// re-validated with the edge itself left out of the graph.
    pub fn update_relationship(
        &mut self,
        actor: &UserId,
        relationship_id: Id,
        req: UpdateFamilyRelationshipRequest,
        directory: &dyn MemberDirectory,
    ) -> Result<Mutation<FamilyRelationship>, CoreError> {
        req.check()?;
        let mut rel = self.require_relationship(relationship_id)?.clone();

        if let Some(kind) = req.relationship_type {
            if kind != rel.relationship_type {
                let candidate = Candidate {
                    from: rel.from_member_id,
                    to: rel.to_member_id,
                    kind,
                };
                let admission = validator::validate_relationship(
                    self,
                    &candidate,
                    directory,
                    Some(relationship_id),
                )?;
                if let Admission::Merge(existing_id) = admission {
                    let existing = self.require_relationship(existing_id)?;
                    return Err(CoreError::ConflictingRelationship {
                        from_member_id: rel.from_member_id,
                        to_member_id: rel.to_member_id,
                        requested: kind,
                        existing_id,
                        existing_type: existing.relationship_type,
                    });
                }
                rel.relationship_type = kind;
            }
        }
        if let Some(start_date) = req.start_date {
            rel.start_date = start_date;
        }
        if let Some(end_date) = req.end_date {
            rel.end_date = end_date;
        }
        if let Some(notes) = req.notes {
            rel.notes = notes;
        }
        check_period(rel.start_date, rel.end_date)?;

        let now = chrono::Utc::now();
        rel.updated_at = now;
        self.relationships.insert(relationship_id, rel.clone());

        let warnings = generation::resolve(self, &[rel.from_member_id, rel.to_member_id]);
        self.touch(actor, now);
        tracing::info!(
            tree_id = %self.tree.id,
            relationship_id = %relationship_id,
            version = self.tree.version,
            "Family relationship updated"
        );
        Ok(Mutation::new(rel, warnings))
    }

    pub fn remove_relationship(
        &mut self,
        actor: &UserId,
        relationship_id: Id,
    ) -> Result<Mutation<FamilyRelationship>, CoreError> {
        self.require_relationship(relationship_id)?;
        let rel = self
            .unindex_relationship(relationship_id)
            .ok_or_else(|| {
                CoreError::Internal(format!(
                    "relationship {relationship_id} vanished during removal"
                ))
            })?;

        let warnings = generation::resolve(self, &[rel.from_member_id, rel.to_member_id]);
        self.touch(actor, chrono::Utc::now());
        tracing::info!(
            tree_id = %self.tree.id,
            relationship_id = %relationship_id,
            version = self.tree.version,
            "Family relationship removed"
        );
        Ok(Mutation {
            changes: EntityChanges {
                removed_relationships: vec![rel.id],
                ..Default::default()
            },
            value: rel,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::family_tree::model::{Gender, RelationshipType};
    use crate::family_tree::requests::PositionInput;
    use crate::family_tree::validator::LocalMembersOnly;

    fn owner() -> UserId {
        "owner-1".to_string()
    }

    fn graph() -> FamilyTreeGraph {
        FamilyTreeGraph::create(
            owner(),
            CreateFamilyTreeRequest {
                name: "Sato family".into(),
                description: None,
            },
            FamilyTreeConfig::default(),
        )
        .unwrap()
    }

    fn add(graph: &mut FamilyTreeGraph, name: &str) -> Id {
        graph
            .add_member(
                &owner(),
                AddFamilyMemberRequest {
                    name: name.into(),
                    gender: Gender::Unknown,
                    ..Default::default()
                },
            )
            .unwrap()
            .value
            .id
    }

    fn relate(
        graph: &mut FamilyTreeGraph,
        from: Id,
        to: Id,
        kind: RelationshipType,
    ) -> Result<Mutation<RelationshipChange>, CoreError> {
        graph.add_relationship(
            &owner(),
            AddFamilyRelationshipRequest::new(from, to, kind),
            &LocalMembersOnly,
        )
    }

    #[test]
    fn new_tree_starts_at_version_one_unshared() {
        let g = graph();
        assert_eq!(g.version(), 1);
        assert!(!g.tree().share_settings.is_shared);
        assert_eq!(g.member_count(), 0);
    }

    #[test]
    fn first_member_is_anchor_at_generation_zero() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let member = g.member(a).unwrap();
        assert_eq!(member.position.generation, 0);
        assert_eq!(member.generation_source, GenerationSource::Anchor);
        assert_eq!(member.family_tree_id, g.id());
        assert_eq!(g.version(), 2);
    }

    #[test]
    fn member_added_after_relationships_is_unresolved() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let b = add(&mut g, "B");
        relate(&mut g, a, b, RelationshipType::Spouse).unwrap();
        let c = add(&mut g, "C");
        assert_eq!(
            g.member(c).unwrap().generation_source,
            GenerationSource::Unresolved
        );
    }

    #[test]
    fn explicit_generation_pins_member() {
        let mut g = graph();
        let m = g
            .add_member(
                &owner(),
                AddFamilyMemberRequest {
                    name: "Grandpa".into(),
                    position: Some(PositionInput {
                        generation: Some(-2),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .unwrap()
            .value;
        assert_eq!(m.position.generation, -2);
        assert!(m.is_generation_pinned());
        assert!(!m.manually_placed);
    }

    #[test]
    fn manual_coordinates_are_kept() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let b = g
            .add_member(
                &owner(),
                AddFamilyMemberRequest {
                    name: "B".into(),
                    position: Some(PositionInput {
                        x: Some(999.0),
                        y: Some(-42.0),
                        generation: None,
                    }),
                    ..Default::default()
                },
            )
            .unwrap()
            .value
            .id;
        relate(&mut g, a, b, RelationshipType::Parent).unwrap();
        let member = g.member(b).unwrap();
        assert_eq!(member.position.generation, 1);
        assert_eq!((member.position.x, member.position.y), (999.0, -42.0));
    }

    #[test]
    fn update_member_cannot_change_tree() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let err = g
            .update_member(
                &owner(),
                a,
                UpdateFamilyMemberRequest {
                    family_tree_id: Some(new_id()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn update_member_applies_partial_fields() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let version = g.version();
        let updated = g
            .update_member(
                &owner(),
                a,
                serde_json::from_value(serde_json::json!({
                    "name": "Akiko",
                    "date_of_death": "2020-01-01"
                }))
                .unwrap(),
            )
            .unwrap()
            .value;
        assert_eq!(updated.name, "Akiko");
        assert!(!updated.is_alive);
        assert_eq!(g.version(), version + 1);
    }

    #[test]
    fn update_member_rejects_alive_with_death_date_and_leaves_state() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let before = g.member(a).unwrap().clone();
        let version = g.version();
        let err = g
            .update_member(
                &owner(),
                a,
                UpdateFamilyMemberRequest {
                    is_alive: Some(true),
                    date_of_death: Some(Some(chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
        assert_eq!(g.member(a).unwrap(), &before);
        assert_eq!(g.version(), version);
    }

    #[test]
    fn unknown_member_is_not_found() {
        let mut g = graph();
        let missing = new_id();
        assert_matches!(
            g.remove_member(&owner(), missing),
            Err(CoreError::NotFound { entity: "FamilyMember", id }) if id == missing
        );
        assert_matches!(
            g.update_member(&owner(), missing, UpdateFamilyMemberRequest::default()),
            Err(CoreError::NotFound { .. })
        );
        assert_matches!(
            g.remove_relationship(&owner(), missing),
            Err(CoreError::NotFound { entity: "FamilyRelationship", .. })
        );
    }

    #[test]
    fn symmetric_edge_is_visible_from_both_ends() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let b = add(&mut g, "B");
        relate(&mut g, a, b, RelationshipType::Sibling).unwrap();
        assert_eq!(g.relationships_of(a).count(), 1);
        assert_eq!(g.relationships_of(b).count(), 1);
        assert_eq!(g.relationships_between(b, a).count(), 1);
    }

    #[test]
    fn restated_spouse_edge_merges_in_place() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let b = add(&mut g, "B");
        let first = relate(&mut g, a, b, RelationshipType::Spouse).unwrap();
        assert_eq!(first.changes.added_relationships, vec![first.value.relationship.id]);
        let first = first.value;
        assert!(!first.merged);

        let mut req = AddFamilyRelationshipRequest::new(b, a, RelationshipType::Spouse);
        req.notes = Some("married in Kyoto".into());
        let second = g.add_relationship(&owner(), req, &LocalMembersOnly).unwrap();
        assert!(second.changes.is_empty());
        let second = second.value;
        assert!(second.merged);
        assert_eq!(second.relationship.id, first.relationship.id);
        assert_eq!(second.relationship.notes.as_deref(), Some("married in Kyoto"));
        assert_eq!(g.relationship_count(), 1);
    }

    #[test]
    fn removing_member_cascades_relationships() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let b = add(&mut g, "B");
        let c = add(&mut g, "C");
        relate(&mut g, a, b, RelationshipType::Parent).unwrap();
        relate(&mut g, b, c, RelationshipType::Parent).unwrap();

        let outcome = g.remove_member(&owner(), b).unwrap();
        assert_eq!(outcome.changes.removed_members, vec![b]);
        let mut cascaded: Vec<Id> = outcome.value.relationships.iter().map(|r| r.id).collect();
        let mut reported = outcome.changes.removed_relationships.clone();
        cascaded.sort();
        reported.sort();
        assert_eq!(reported, cascaded);
        let removed = outcome.value;
        assert_eq!(removed.relationships.len(), 2);
        assert_eq!(g.relationship_count(), 0);
        assert!(g.member(b).is_none());
        assert_eq!(g.relationships_of(a).count(), 0);
        assert_eq!(g.member(c).unwrap().position.generation, 2);
    }

    #[test]
    fn failed_relationship_leaves_version_untouched() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let version = g.version();
        assert_matches!(
            relate(&mut g, a, a, RelationshipType::Spouse),
            Err(CoreError::SelfRelationship { .. })
        );
        assert_eq!(g.version(), version);
    }

    #[test]
    fn update_relationship_type_is_revalidated() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let b = add(&mut g, "B");
        let c = add(&mut g, "C");
        relate(&mut g, a, b, RelationshipType::Parent).unwrap();
        let bc = relate(&mut g, b, c, RelationshipType::Sibling)
            .unwrap()
            .value
            .relationship
            .id;

        // Turning "B sibling C" into "C parent-of B" is fine.
        let updated = g
            .update_relationship(
                &owner(),
                bc,
                UpdateFamilyRelationshipRequest {
                    relationship_type: Some(RelationshipType::Child),
                    ..Default::default()
                },
                &LocalMembersOnly,
            )
            .unwrap()
            .value;
        assert_eq!(updated.relationship_type, RelationshipType::Child);
        assert_eq!(g.member(c).unwrap().position.generation, 0);
    }

    #[test]
    fn update_relationship_rejects_inverted_period() {
        let mut g = graph();
        let a = add(&mut g, "A");
        let b = add(&mut g, "B");
        let id = relate(&mut g, a, b, RelationshipType::Spouse)
            .unwrap()
            .value
            .relationship
            .id;
        let date = |y| chrono::NaiveDate::from_ymd_opt(y, 1, 1).unwrap();
        let err = g
            .update_relationship(
                &owner(),
                id,
                UpdateFamilyRelationshipRequest {
                    start_date: Some(Some(date(2010))),
                    end_date: Some(Some(date(2000))),
                    ..Default::default()
                },
                &LocalMembersOnly,
            )
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
        assert_eq!(g.relationship(id).unwrap().start_date, None);
    }

    #[test]
    fn update_tree_renames_and_clears_description() {
        let mut g = graph();
        g.update_tree(
            &owner(),
            UpdateFamilyTreeRequest {
                name: None,
                description: Some(Some("paternal line".into())),
            },
        )
        .unwrap();
        assert_eq!(g.tree().description.as_deref(), Some("paternal line"));

        let tree = g
            .update_tree(
                &owner(),
                UpdateFamilyTreeRequest {
                    name: Some("Sato-Yamada".into()),
                    description: Some(None),
                },
            )
            .unwrap();
        assert_eq!(tree.name, "Sato-Yamada");
        assert_eq!(tree.description, None);
        assert_eq!(tree.version, 3);
    }

    #[test]
    fn snapshot_lists_members_in_insertion_order() {
        let mut g = graph();
        let ids: Vec<Id> = ["A", "B", "C"].iter().map(|n| add(&mut g, n)).collect();
        let snapshot = g.snapshot();
        let listed: Vec<Id> = snapshot.members.iter().map(|m| m.id).collect();
        assert_eq!(listed, ids);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["name"], "Sato family");
        assert_eq!(json["members"].as_array().unwrap().len(), 3);
    }
}
