//! Owns every family tree held in memory.
//!
//! Writers to one tree are serialised by that tree's mutex, held across
//! validate, commit and resolve. Different trees proceed in parallel. An
//! optional `expected_version` is compared only after the lock is taken, so
//! a caller racing another writer sees [`CoreError::StaleVersion`] instead of
//! overwriting it.
//!
//! A tree lock is always taken before the index lock. The map lock is never
//! held while waiting on a tree.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::Serialize;

use crate::config::FamilyTreeConfig;
use crate::error::CoreError;
use crate::family_tree::generation::GenerationConflict;
use crate::family_tree::model::{FamilyMember, FamilyRelationship, FamilyTree, ShareSettings};
use crate::family_tree::requests::{
    AddFamilyMemberRequest, AddFamilyRelationshipRequest, CreateFamilyTreeRequest,
    ShareTreeRequest, UpdateFamilyMemberRequest, UpdateFamilyRelationshipRequest,
    UpdateFamilyTreeRequest,
};
use crate::family_tree::share::{self, AccessLevel, Bearer};
use crate::family_tree::store::{
    EntityChanges, FamilyTreeGraph, FamilyTreeSnapshot, Mutation, RelationshipChange,
    RemovedMember,
};
use crate::family_tree::transfer::{self, FamilyTreeExport, ImportReport};
use crate::family_tree::validator::MemberDirectory;
use crate::types::{Id, UserId};

/// Response for every committed write: the affected value, the full tree
/// afterwards and any generation conflicts.
#[derive(Debug, Clone, Serialize)]
pub struct TreeUpdate<T> {
    pub value: T,
    pub tree: FamilyTreeSnapshot,
    pub warnings: Vec<GenerationConflict>,
}

struct TreeSlot {
    graph: FamilyTreeGraph,
    /// Set when the tree is deleted while another caller still holds the
    /// slot handle.
    retired: bool,
}

/// Which tree owns each member and relationship.
#[derive(Debug, Default)]
struct EntityIndex {
    members: HashMap<Id, Id>,
    relationships: HashMap<Id, Id>,
}

impl EntityIndex {
    /// Touches only the listed ids.
    fn apply(&mut self, tree_id: Id, changes: &EntityChanges) {
        for id in &changes.removed_members {
            self.members.remove(id);
        }
        for id in &changes.removed_relationships {
            self.relationships.remove(id);
        }
        for id in &changes.added_members {
            self.members.insert(*id, tree_id);
        }
        for id in &changes.added_relationships {
            self.relationships.insert(*id, tree_id);
        }
    }

    fn record_graph(&mut self, graph: &FamilyTreeGraph) {
        for member in graph.members() {
            self.members.insert(member.id, graph.id());
        }
        for rel in graph.relationships() {
            self.relationships.insert(rel.id, graph.id());
        }
    }

    fn forget_graph(&mut self, graph: &FamilyTreeGraph) {
        for member in graph.members() {
            self.members.remove(&member.id);
        }
        for rel in graph.relationships() {
            self.relationships.remove(&rel.id);
        }
    }
}

impl MemberDirectory for EntityIndex {
    fn tree_of(&self, member_id: Id) -> Option<Id> {
        self.members.get(&member_id).copied()
    }
}

fn poisoned(what: &str) -> CoreError {
    CoreError::Internal(format!("{what} lock poisoned"))
}

fn tree_not_found(id: Id) -> CoreError {
    CoreError::NotFound {
        entity: "FamilyTree",
        id,
    }
}

fn member_not_found(id: Id) -> CoreError {
    CoreError::NotFound {
        entity: "FamilyMember",
        id,
    }
}

fn relationship_not_found(id: Id) -> CoreError {
    CoreError::NotFound {
        entity: "FamilyRelationship",
        id,
    }
}

/// Thread-safe home of all trees. Wrap in `Arc` to share.
pub struct FamilyTreeRegistry {
    trees: RwLock<HashMap<Id, Arc<Mutex<TreeSlot>>>>,
    index: RwLock<EntityIndex>,
    config: FamilyTreeConfig,
}

impl Default for FamilyTreeRegistry {
    fn default() -> Self {
        Self::new(FamilyTreeConfig::default())
    }
}

impl FamilyTreeRegistry {
    pub fn new(config: FamilyTreeConfig) -> Self {
        Self {
            trees: RwLock::new(HashMap::new()),
            index: RwLock::new(EntityIndex::default()),
            config,
        }
    }

    pub fn config(&self) -> &FamilyTreeConfig {
        &self.config
    }

    pub fn tree_count(&self) -> Result<usize, CoreError> {
        Ok(self.trees.read().map_err(|_| poisoned("tree map"))?.len())
    }

    // -- plumbing -----------------------------------------------------------

    fn slot(&self, tree_id: Id) -> Result<Arc<Mutex<TreeSlot>>, CoreError> {
        self.trees
            .read()
            .map_err(|_| poisoned("tree map"))?
            .get(&tree_id)
            .cloned()
            .ok_or_else(|| tree_not_found(tree_id))
    }

    fn lock<'a>(slot: &'a Mutex<TreeSlot>, tree_id: Id) -> Result<MutexGuard<'a, TreeSlot>, CoreError> {
        let guard = slot.lock().map_err(|_| poisoned("family tree"))?;
        if guard.retired {
            return Err(tree_not_found(tree_id));
        }
        Ok(guard)
    }

    fn tree_of_member(&self, member_id: Id) -> Result<Id, CoreError> {
        self.index
            .read()
            .map_err(|_| poisoned("entity index"))?
            .members
            .get(&member_id)
            .copied()
            .ok_or_else(|| member_not_found(member_id))
    }

    fn tree_of_relationship(&self, relationship_id: Id) -> Result<Id, CoreError> {
        self.index
            .read()
            .map_err(|_| poisoned("entity index"))?
            .relationships
            .get(&relationship_id)
            .copied()
            .ok_or_else(|| relationship_not_found(relationship_id))
    }

    /// Run a read-only closure against a tree after a read-access check.
    pub fn read<T>(
        &self,
        tree_id: Id,
        bearer: &Bearer,
        f: impl FnOnce(&FamilyTreeGraph) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let slot = self.slot(tree_id)?;
        let guard = Self::lock(&slot, tree_id)?;
        share::check_access(guard.graph.tree(), bearer, AccessLevel::Read, chrono::Utc::now())?;
        f(&guard.graph)
    }

    /// Serialised write: lock, access check, version check, mutate, then
    /// index the entities the mutation created or deleted.
    fn write<T>(
        &self,
        tree_id: Id,
        bearer: &Bearer,
        expected_version: Option<u64>,
        f: impl FnOnce(&mut FamilyTreeGraph, &UserId, &EntityIndex) -> Result<Mutation<T>, CoreError>,
    ) -> Result<TreeUpdate<T>, CoreError> {
        let slot = self.slot(tree_id)?;
        let mut guard = Self::lock(&slot, tree_id)?;
        let graph = &mut guard.graph;

        share::check_access(graph.tree(), bearer, AccessLevel::Write, chrono::Utc::now())?;
        let actor = bearer
            .user_id()
            .ok_or_else(|| CoreError::AccessDenied("share tokens are read-only".to_string()))?
            .clone();

        if let Some(expected) = expected_version {
            let actual = graph.version();
            if expected != actual {
                tracing::debug!(tree_id = %tree_id, expected, actual, "Stale write rejected");
                return Err(CoreError::StaleVersion { expected, actual });
            }
        }

        let mutation = {
            let index = self.index.read().map_err(|_| poisoned("entity index"))?;
            f(graph, &actor, &index)?
        };
        if !mutation.changes.is_empty() {
            self.index
                .write()
                .map_err(|_| poisoned("entity index"))?
                .apply(tree_id, &mutation.changes);
        }

        Ok(TreeUpdate {
            value: mutation.value,
            tree: graph.snapshot(),
            warnings: mutation.warnings,
        })
    }

    // -- trees --------------------------------------------------------------

    pub fn create_tree(
        &self,
        owner: &UserId,
        req: CreateFamilyTreeRequest,
    ) -> Result<FamilyTreeSnapshot, CoreError> {
        let graph = FamilyTreeGraph::create(owner.clone(), req, self.config)?;
        let snapshot = graph.snapshot();
        self.trees
            .write()
            .map_err(|_| poisoned("tree map"))?
            .insert(
                graph.id(),
                Arc::new(Mutex::new(TreeSlot {
                    graph,
                    retired: false,
                })),
            );
        Ok(snapshot)
    }

    pub fn update_tree(
        &self,
        tree_id: Id,
        bearer: &Bearer,
        expected_version: Option<u64>,
        req: UpdateFamilyTreeRequest,
    ) -> Result<TreeUpdate<FamilyTree>, CoreError> {
        self.write(tree_id, bearer, expected_version, |graph, actor, _| {
            Ok(Mutation::new(graph.update_tree(actor, req)?, Vec::new()))
        })
    }

    /// Delete a tree with all its members and relationships. Owner only.
    pub fn delete_tree(&self, tree_id: Id, bearer: &Bearer) -> Result<FamilyTreeSnapshot, CoreError> {
        let slot = self.slot(tree_id)?;
        let mut guard = Self::lock(&slot, tree_id)?;
        share::require_owner(guard.graph.tree(), bearer)?;

        guard.retired = true;
        self.trees
            .write()
            .map_err(|_| poisoned("tree map"))?
            .remove(&tree_id);
        self.index
            .write()
            .map_err(|_| poisoned("entity index"))?
            .forget_graph(&guard.graph);

        let snapshot = guard.graph.snapshot();
        tracing::info!(
            tree_id = %tree_id,
            members = snapshot.members.len(),
            relationships = snapshot.relationships.len(),
            "Family tree deleted"
        );
        Ok(snapshot)
    }

    pub fn snapshot(&self, tree_id: Id, bearer: &Bearer) -> Result<FamilyTreeSnapshot, CoreError> {
        self.read(tree_id, bearer, |graph| Ok(graph.snapshot()))
    }

    // -- members ------------------------------------------------------------

    pub fn add_member(
        &self,
        tree_id: Id,
        bearer: &Bearer,
        expected_version: Option<u64>,
        req: AddFamilyMemberRequest,
    ) -> Result<TreeUpdate<FamilyMember>, CoreError> {
        self.write(tree_id, bearer, expected_version, |graph, actor, _| {
            graph.add_member(actor, req)
        })
    }

    pub fn update_member(
        &self,
        member_id: Id,
        bearer: &Bearer,
        expected_version: Option<u64>,
        req: UpdateFamilyMemberRequest,
    ) -> Result<TreeUpdate<FamilyMember>, CoreError> {
        let tree_id = self.tree_of_member(member_id)?;
        self.write(tree_id, bearer, expected_version, |graph, actor, _| {
            graph.update_member(actor, member_id, req)
        })
    }

    pub fn remove_member(
        &self,
        member_id: Id,
        bearer: &Bearer,
        expected_version: Option<u64>,
    ) -> Result<TreeUpdate<RemovedMember>, CoreError> {
        let tree_id = self.tree_of_member(member_id)?;
        self.write(tree_id, bearer, expected_version, |graph, actor, _| {
            graph.remove_member(actor, member_id)
        })
    }

    // -- relationships ------------------------------------------------------

    pub fn add_relationship(
        &self,
        tree_id: Id,
        bearer: &Bearer,
        expected_version: Option<u64>,
        req: AddFamilyRelationshipRequest,
    ) -> Result<TreeUpdate<RelationshipChange>, CoreError> {
        self.write(tree_id, bearer, expected_version, |graph, actor, index| {
            graph.add_relationship(actor, req, index)
        })
    }

    pub fn update_relationship(
        &self,
        relationship_id: Id,
        bearer: &Bearer,
        expected_version: Option<u64>,
        req: UpdateFamilyRelationshipRequest,
    ) -> Result<TreeUpdate<FamilyRelationship>, CoreError> {
        let tree_id = self.tree_of_relationship(relationship_id)?;
        self.write(tree_id, bearer, expected_version, |graph, actor, index| {
            graph.update_relationship(actor, relationship_id, req, index)
        })
    }

    pub fn remove_relationship(
        &self,
        relationship_id: Id,
        bearer: &Bearer,
        expected_version: Option<u64>,
    ) -> Result<TreeUpdate<FamilyRelationship>, CoreError> {
        let tree_id = self.tree_of_relationship(relationship_id)?;
        self.write(tree_id, bearer, expected_version, |graph, actor, _| {
            graph.remove_relationship(actor, relationship_id)
        })
    }

    // -- sharing ------------------------------------------------------------

    /// Share with `allowed_users` and issue a fresh token. Owner only.
    pub fn share_tree(
        &self,
        tree_id: Id,
        bearer: &Bearer,
        expected_version: Option<u64>,
        req: ShareTreeRequest,
    ) -> Result<TreeUpdate<ShareSettings>, CoreError> {
        let config = self.config.share;
        self.write(tree_id, bearer, expected_version, |graph, actor, _| {
            share::require_owner(graph.tree(), bearer)?;
            let now = chrono::Utc::now();
            req.check(now)?;
            let settings = share::shared_settings(req, config, now)?;
            graph.replace_share_settings(actor, settings.clone());
            tracing::info!(
                tree_id = %graph.id(),
                allowed_users = settings.allowed_users.len(),
                expires_at = ?settings.expires_at,
                "Family tree shared"
            );
            Ok(Mutation::new(settings, Vec::new()))
        })
    }

    /// Revoke every grant and the token. Owner only.
    pub fn unshare_tree(
        &self,
        tree_id: Id,
        bearer: &Bearer,
        expected_version: Option<u64>,
    ) -> Result<TreeUpdate<ShareSettings>, CoreError> {
        self.write(tree_id, bearer, expected_version, |graph, actor, _| {
            share::require_owner(graph.tree(), bearer)?;
            graph.replace_share_settings(actor, ShareSettings::default());
            tracing::info!(tree_id = %graph.id(), "Family tree unshared");
            Ok(Mutation::new(ShareSettings::default(), Vec::new()))
        })
    }

    // -- transfer -----------------------------------------------------------

    pub fn export(&self, tree_id: Id, bearer: &Bearer) -> Result<FamilyTreeExport, CoreError> {
        let exported_by = match bearer {
            Bearer::User(id) => id.clone(),
            Bearer::Token(_) => "share-token".to_string(),
        };
        self.read(tree_id, bearer, |graph| {
            Ok(transfer::export_graph(graph, exported_by))
        })
    }

    /// Import an envelope as a new tree owned by `owner`.
    pub fn import_tree(
        &self,
        owner: &UserId,
        export: FamilyTreeExport,
    ) -> Result<(FamilyTreeSnapshot, ImportReport), CoreError> {
        let (graph, report) = transfer::import_graph(owner.clone(), export, self.config)?;
        let snapshot = graph.snapshot();
        self.index
            .write()
            .map_err(|_| poisoned("entity index"))?
            .record_graph(&graph);
        self.trees
            .write()
            .map_err(|_| poisoned("tree map"))?
            .insert(
                graph.id(),
                Arc::new(Mutex::new(TreeSlot {
                    graph,
                    retired: false,
                })),
            );
        Ok((snapshot, report))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::family_tree::model::RelationshipType;
    use crate::types::new_id;

    fn owner() -> Bearer {
        Bearer::user("owner")
    }

    fn setup() -> (FamilyTreeRegistry, Id) {
        let registry = FamilyTreeRegistry::default();
        let tree = registry
            .create_tree(
                &"owner".to_string(),
                CreateFamilyTreeRequest {
                    name: "Registry".into(),
                    description: None,
                },
            )
            .unwrap();
        (registry, tree.tree.id)
    }

    fn add(registry: &FamilyTreeRegistry, tree_id: Id, name: &str) -> Id {
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
            .unwrap()
            .value
            .id
    }

    #[test]
    fn unknown_tree_is_not_found() {
        let registry = FamilyTreeRegistry::default();
        assert_matches!(
            registry.snapshot(new_id(), &owner()),
            Err(CoreError::NotFound { entity: "FamilyTree", .. })
        );
    }

    #[test]
    fn stale_version_is_rejected_after_lock() {
        let (registry, tree_id) = setup();
        let update = registry
            .add_member(
                tree_id,
                &owner(),
                Some(1),
                AddFamilyMemberRequest {
                    name: "A".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(update.tree.tree.version, 2);

        let err = registry
            .add_member(
                tree_id,
                &owner(),
                Some(1),
                AddFamilyMemberRequest {
                    name: "B".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_matches!(err, CoreError::StaleVersion { expected: 1, actual: 2 });
        assert_eq!(registry.snapshot(tree_id, &owner()).unwrap().members.len(), 1);
    }

    #[test]
    fn member_of_other_tree_is_cross_tree_reference() {
        let (registry, first) = setup();
        let second = registry
            .create_tree(
                &"owner".to_string(),
                CreateFamilyTreeRequest {
                    name: "Second".into(),
                    description: None,
                },
            )
            .unwrap()
            .tree
            .id;
        let a = add(&registry, first, "A");
        let foreign = add(&registry, second, "Foreign");

        let err = registry
            .add_relationship(
                first,
                &owner(),
                None,
                AddFamilyRelationshipRequest::new(a, foreign, RelationshipType::Spouse),
            )
            .unwrap_err();
        assert_matches!(
            err,
            CoreError::CrossTreeReference { member_id, tree_id } if member_id == foreign && tree_id == first
        );
    }

    #[test]
    fn member_operations_route_by_member_id() {
        let (registry, tree_id) = setup();
        let a = add(&registry, tree_id, "A");
        let b = add(&registry, tree_id, "B");
        let rel = registry
            .add_relationship(
                tree_id,
                &owner(),
                None,
                AddFamilyRelationshipRequest::new(a, b, RelationshipType::Parent),
            )
            .unwrap()
            .value
            .relationship;

        let updated = registry
            .update_member(
                b,
                &owner(),
                None,
                UpdateFamilyMemberRequest {
                    name: Some("Bee".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.value.name, "Bee");

        registry.remove_relationship(rel.id, &owner(), None).unwrap();
        assert_matches!(
            registry.remove_relationship(rel.id, &owner(), None),
            Err(CoreError::NotFound { entity: "FamilyRelationship", .. })
        );

        registry.remove_member(a, &owner(), None).unwrap();
        assert_matches!(
            registry.update_member(a, &owner(), None, UpdateFamilyMemberRequest::default()),
            Err(CoreError::NotFound { entity: "FamilyMember", .. })
        );
    }

    #[test]
    fn token_holder_reads_but_cannot_write() {
        let (registry, tree_id) = setup();
        let shared = registry
            .share_tree(tree_id, &owner(), None, ShareTreeRequest::default())
            .unwrap();
        let token = shared.value.share_token.clone().unwrap();
        assert_eq!(token.len(), registry.config().share.token_length);

        let reader = Bearer::token(token);
        assert!(registry.snapshot(tree_id, &reader).is_ok());
        assert_matches!(
            registry.add_member(
                tree_id,
                &reader,
                None,
                AddFamilyMemberRequest {
                    name: "X".into(),
                    ..Default::default()
                }
            ),
            Err(CoreError::AccessDenied(_))
        );
    }

    #[test]
    fn reshare_rotates_token_and_unshare_revokes() {
        let (registry, tree_id) = setup();
        let first = registry
            .share_tree(tree_id, &owner(), None, ShareTreeRequest::default())
            .unwrap();
        let second = registry
            .share_tree(tree_id, &owner(), None, ShareTreeRequest::default())
            .unwrap();
        assert_ne!(first.value.share_token, second.value.share_token);
        assert_eq!(second.tree.tree.version, first.tree.tree.version + 1);

        let old = Bearer::token(first.value.share_token.unwrap());
        assert_matches!(registry.snapshot(tree_id, &old), Err(CoreError::AccessDenied(_)));

        let unshared = registry.unshare_tree(tree_id, &owner(), None).unwrap();
        assert_eq!(unshared.tree.tree.share_settings, ShareSettings::default());
        let current = Bearer::token(second.value.share_token.unwrap());
        assert_matches!(registry.snapshot(tree_id, &current), Err(CoreError::AccessDenied(_)));
    }

    #[test]
    fn share_and_unshare_honour_expected_version() {
        let (registry, tree_id) = setup();
        let shared = registry
            .share_tree(tree_id, &owner(), Some(1), ShareTreeRequest::default())
            .unwrap();
        assert_eq!(shared.tree.tree.version, 2);

        assert_matches!(
            registry.share_tree(tree_id, &owner(), Some(1), ShareTreeRequest::default()),
            Err(CoreError::StaleVersion { expected: 1, actual: 2 })
        );
        assert_matches!(
            registry.unshare_tree(tree_id, &owner(), Some(1)),
            Err(CoreError::StaleVersion { expected: 1, actual: 2 })
        );
        let token = registry.snapshot(tree_id, &owner()).unwrap().tree.share_settings.share_token;
        assert_eq!(token, shared.value.share_token);
    }

    #[test]
    fn out_of_range_ttl_fails_without_poisoning_tree() {
        let mut config = FamilyTreeConfig::default();
        config.share.default_ttl_hours = Some(4_000_000_000);
        let registry = FamilyTreeRegistry::new(config);
        let tree_id = registry
            .create_tree(
                &"owner".to_string(),
                CreateFamilyTreeRequest {
                    name: "Ttl".into(),
                    description: None,
                },
            )
            .unwrap()
            .tree
            .id;

        assert_matches!(
            registry.share_tree(tree_id, &owner(), None, ShareTreeRequest::default()),
            Err(CoreError::Validation(_))
        );
        let snapshot = registry.snapshot(tree_id, &owner()).unwrap();
        assert_eq!(snapshot.tree.version, 1);
        assert!(!snapshot.tree.share_settings.is_shared);
        add(&registry, tree_id, "Still writable");
    }

    #[test]
    fn index_follows_each_mutation() {
        let (registry, first) = setup();
        let second = registry
            .create_tree(
                &"owner".to_string(),
                CreateFamilyTreeRequest {
                    name: "Second".into(),
                    description: None,
                },
            )
            .unwrap()
            .tree
            .id;
        let a = add(&registry, first, "A");
        let b = add(&registry, first, "B");
        let other = add(&registry, second, "Other");
        let rel = registry
            .add_relationship(
                first,
                &owner(),
                None,
                AddFamilyRelationshipRequest::new(a, b, RelationshipType::Spouse),
            )
            .unwrap()
            .value
            .relationship
            .id;
        assert_eq!(registry.tree_of_relationship(rel).unwrap(), first);

        registry.remove_member(a, &owner(), None).unwrap();
        assert_matches!(registry.tree_of_member(a), Err(CoreError::NotFound { .. }));
        assert_matches!(registry.tree_of_relationship(rel), Err(CoreError::NotFound { .. }));
        assert_eq!(registry.tree_of_member(b).unwrap(), first);
        assert_eq!(registry.tree_of_member(other).unwrap(), second);

        registry.delete_tree(first, &owner()).unwrap();
        assert_matches!(registry.tree_of_member(b), Err(CoreError::NotFound { .. }));
        assert_eq!(registry.tree_of_member(other).unwrap(), second);
    }

    #[test]
    fn allowed_user_writes_but_cannot_share() {
        let (registry, tree_id) = setup();
        registry
            .share_tree(
                tree_id,
                &owner(),
                None,
                ShareTreeRequest {
                    allowed_users: ["cousin".to_string()].into(),
                    expires_at: None,
                },
            )
            .unwrap();
        let cousin = Bearer::user("cousin");
        let update = registry
            .add_member(
                tree_id,
                &cousin,
                None,
                AddFamilyMemberRequest {
                    name: "Added by cousin".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(update.tree.tree.last_modified_by, "cousin");
        assert_matches!(
            registry.unshare_tree(tree_id, &cousin, None),
            Err(CoreError::AccessDenied(_))
        );
        assert_matches!(registry.delete_tree(tree_id, &cousin), Err(CoreError::AccessDenied(_)));
    }

    #[test]
    fn delete_cascades_and_forgets_members() {
        let (registry, tree_id) = setup();
        let a = add(&registry, tree_id, "A");
        let removed = registry.delete_tree(tree_id, &owner()).unwrap();
        assert_eq!(removed.members.len(), 1);
        assert_eq!(registry.tree_count().unwrap(), 0);
        assert_matches!(
            registry.update_member(a, &owner(), None, UpdateFamilyMemberRequest::default()),
            Err(CoreError::NotFound { entity: "FamilyMember", .. })
        );
        assert_matches!(
            registry.snapshot(tree_id, &owner()),
            Err(CoreError::NotFound { .. })
        );
    }

    #[test]
    fn export_and_reimport_creates_independent_tree() {
        let (registry, tree_id) = setup();
        let a = add(&registry, tree_id, "A");
        let b = add(&registry, tree_id, "B");
        registry
            .add_relationship(
                tree_id,
                &owner(),
                None,
                AddFamilyRelationshipRequest::new(a, b, RelationshipType::Sibling),
            )
            .unwrap();
        let export = registry.export(tree_id, &owner()).unwrap();
        let (snapshot, report) = registry.import_tree(&"other".to_string(), export).unwrap();
        assert!(report.is_clean());
        assert_ne!(snapshot.tree.id, tree_id);
        assert_eq!(snapshot.tree.owner_id, "other");
        assert_eq!(snapshot.relationships.len(), 1);
        assert_eq!(registry.tree_count().unwrap(), 2);

        // Imported members are routable through the index.
        let imported = snapshot.members[0].id;
        assert!(registry
            .update_member(
                imported,
                &Bearer::user("other"),
                None,
                UpdateFamilyMemberRequest::default()
            )
            .is_ok());
    }
}
