//! Consistency checks run before a relationship is committed.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. self-reference
//! 2. same-tree membership of both endpoints
//! 3. pairwise exclusion against existing edges between the pair
//! 4. ancestry acyclicity (only edges the ancestry policy counts)
//! 5. restated symmetric edges fold into the existing one

use std::collections::{HashSet, VecDeque};

use crate::config::AncestryPolicy;
use crate::error::CoreError;
use crate::family_tree::model::RelationshipType;
use crate::family_tree::rules::{self, PairRule};
use crate::family_tree::store::FamilyTreeGraph;
use crate::types::Id;

/// Resolves which tree owns a member the current graph does not contain.
pub trait MemberDirectory {
    fn tree_of(&self, member_id: Id) -> Option<Id>;
}

/// Directory for a graph used on its own: foreign members are simply unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalMembersOnly;

impl MemberDirectory for LocalMembersOnly {
    fn tree_of(&self, _member_id: Id) -> Option<Id> {
        None
    }
}

/// A relationship proposed for commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub from: Id,
    pub to: Id,
    pub kind: RelationshipType,
}

/// What the store should do with a candidate that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Insert,
    /// Update the existing symmetric edge with this id in place.
    Merge(Id),
}

/// Validate `candidate` against the current graph.
///
/// `exclude` names a relationship to ignore, used when re-validating an
/// edge whose type is being changed.
pub fn validate_relationship(
    graph: &FamilyTreeGraph,
    candidate: &Candidate,
    directory: &dyn MemberDirectory,
    exclude: Option<Id>,
) -> Result<Admission, CoreError> {
    let result = run_checks(graph, candidate, directory, exclude);
    if let Err(err) = &result {
        tracing::debug!(
            tree_id = %graph.id(),
            from = %candidate.from,
            to = %candidate.to,
            relationship_type = %candidate.kind,
            code = err.code(),
            "Relationship rejected"
        );
    }
    result
}

fn run_checks(
    graph: &FamilyTreeGraph,
    candidate: &Candidate,
    directory: &dyn MemberDirectory,
    exclude: Option<Id>,
) -> Result<Admission, CoreError> {
    // 1. self-reference
    rules::check_in_isolation(candidate.from, candidate.to)?;

    // 2. same-tree membership
    for member_id in [candidate.from, candidate.to] {
        check_membership(graph, member_id, directory)?;
    }

    // 3. pairwise exclusion
    let mut same_edge = None;
    for existing in graph.relationships_between(candidate.from, candidate.to) {
        if Some(existing.id) == exclude {
            continue;
        }
        match rules::pair_rule(existing.relationship_type, candidate.kind) {
            PairRule::Compatible => {}
            PairRule::SameEdge => same_edge = Some(existing.id),
            PairRule::Conflicting => {
                return Err(CoreError::ConflictingRelationship {
                    from_member_id: candidate.from,
                    to_member_id: candidate.to,
                    requested: candidate.kind,
                    existing_id: existing.id,
                    existing_type: existing.relationship_type,
                });
            }
        }
    }

    // 4. ancestry acyclicity
    let policy = graph.config().ancestry;
    if let Some(edge) = rules::lineage_of(candidate.kind, candidate.from, candidate.to) {
        if rules::counts_as_ancestry(edge.kind, policy)
            && is_ancestor(graph, edge.child, edge.parent, policy, exclude)
        {
            return Err(CoreError::CycleDetected {
                parent_id: edge.parent,
                child_id: edge.child,
            });
        }
    }

    // 5. symmetric restatement
    Ok(match same_edge {
        Some(existing_id) => Admission::Merge(existing_id),
        None => Admission::Insert,
    })
}

fn check_membership(
    graph: &FamilyTreeGraph,
    member_id: Id,
    directory: &dyn MemberDirectory,
) -> Result<(), CoreError> {
    match graph.member(member_id) {
        Some(member) if member.family_tree_id == graph.id() => Ok(()),
        Some(_) => Err(CoreError::CrossTreeReference {
            member_id,
            tree_id: graph.id(),
        }),
        None => match directory.tree_of(member_id) {
            Some(_) => Err(CoreError::CrossTreeReference {
                member_id,
                tree_id: graph.id(),
            }),
            None => Err(CoreError::NotFound {
                entity: "FamilyMember",
                id: member_id,
            }),
        },
    }
}

/// Parents of `member_id` through edges the policy counts as ancestry.
fn counted_parents(
    graph: &FamilyTreeGraph,
    member_id: Id,
    policy: AncestryPolicy,
    exclude: Option<Id>,
) -> impl Iterator<Item = Id> + '_ {
    graph
        .relationships_of(member_id)
        .filter(move |rel| Some(rel.id) != exclude)
        .filter_map(move |rel| rules::ancestry_edge(rel, policy))
        .filter(move |edge| edge.child == member_id)
        .map(|edge| edge.parent)
}

/// Transitive ancestors of `member_id`, excluding the member itself unless
/// the graph already contains a cycle through it.
pub fn ancestor_closure(
    graph: &FamilyTreeGraph,
    member_id: Id,
    policy: AncestryPolicy,
) -> HashSet<Id> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([member_id]);
    while let Some(current) = queue.pop_front() {
        for parent in counted_parents(graph, current, policy, None) {
            if seen.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    seen
}

/// Returns `true` if `ancestor` is reachable by walking counted parent edges
/// up from `descendant`.
pub fn is_ancestor(
    graph: &FamilyTreeGraph,
    ancestor: Id,
    descendant: Id,
    policy: AncestryPolicy,
    exclude: Option<Id>,
) -> bool {
    if ancestor == descendant {
        return false;
    }
    let mut seen = HashSet::from([descendant]);
    let mut queue = VecDeque::from([descendant]);
    while let Some(current) = queue.pop_front() {
        for parent in counted_parents(graph, current, policy, exclude) {
            if parent == ancestor {
                return true;
            }
            if seen.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    false
}
