//! Shared fixtures for registry-level integration tests.

#![allow(dead_code)]

use ending_note_core::config::FamilyTreeConfig;
use ending_note_core::error::CoreError;
use ending_note_core::family_tree::requests::{
    AddFamilyMemberRequest, AddFamilyRelationshipRequest, CreateFamilyTreeRequest,
};
use ending_note_core::family_tree::store::RelationshipChange;
use ending_note_core::family_tree::{
    Bearer, FamilyMember, FamilyTreeRegistry, RelationshipType, TreeUpdate,
};
use ending_note_core::types::Id;

pub const OWNER: &str = "owner-1";

pub fn owner() -> Bearer {
    Bearer::user(OWNER)
}

/// A registry holding one empty tree owned by [`OWNER`].
pub fn registry_with_tree(config: FamilyTreeConfig) -> (FamilyTreeRegistry, Id) {
    let registry = FamilyTreeRegistry::new(config);
    let snapshot = registry
        .create_tree(
            &OWNER.to_string(),
            CreateFamilyTreeRequest {
                name: "Tanaka family".into(),
                description: Some("test fixture".into()),
            },
        )
        .expect("create tree");
    (registry, snapshot.tree.id)
}

pub fn add_member(registry: &FamilyTreeRegistry, tree_id: Id, name: &str) -> Id {
    registry
        .add_member(
            tree_id,
            &owner(),
            None,
            AddFamilyMemberRequest {
                name: name.into(),
                ..Default::default()
            },
        )
        .expect("add member")
        .value
        .id
}

pub fn relate(
    registry: &FamilyTreeRegistry,
    tree_id: Id,
    from: Id,
    to: Id,
    kind: RelationshipType,
) -> Result<TreeUpdate<RelationshipChange>, CoreError> {
    registry.add_relationship(
        tree_id,
        &owner(),
        None,
        AddFamilyRelationshipRequest::new(from, to, kind),
    )
}

pub fn member(registry: &FamilyTreeRegistry, tree_id: Id, id: Id) -> FamilyMember {
    registry
        .snapshot(tree_id, &owner())
        .expect("snapshot")
        .members
        .into_iter()
        .find(|m| m.id == id)
        .expect("member present")
}

pub fn generation(registry: &FamilyTreeRegistry, tree_id: Id, id: Id) -> i32 {
    member(registry, tree_id, id).position.generation
}
