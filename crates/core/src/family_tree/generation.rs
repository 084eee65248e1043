//! Generation resolution and default canvas layout.
//!
//! Generations are a display aid: the resolver never fails. Members whose
//! incoming paths demand different generations keep their previous value and
//! are reported as [`GenerationConflict`] warnings.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::config::AncestryPolicy;
use crate::family_tree::model::{FamilyMember, GenerationSource};
use crate::family_tree::rules;
use crate::family_tree::store::FamilyTreeGraph;
use crate::types::Id;

/// A member reached through paths that disagree about its generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationConflict {
    pub member_id: Id,
    /// Every generation demanded for the member, ascending.
    pub candidates: Vec<i32>,
    /// The generation the member kept.
    pub kept: i32,
}

/// Neighbours of `member_id` along generation-bearing edges, with the
/// generation offset from the member to the neighbour.
///
/// Counted parent/child edges give -1 / +1; spouse and sibling edges give 0.
pub fn generation_neighbours(
    graph: &FamilyTreeGraph,
    member_id: Id,
    policy: AncestryPolicy,
) -> Vec<(Id, i32)> {
    graph
        .relationships_of(member_id)
        .filter_map(|rel| {
            if rules::shares_generation(rel.relationship_type) {
                return rel.other_end(member_id).map(|other| (other, 0));
            }
            let edge = rules::ancestry_edge(rel, policy)?;
            if edge.parent == member_id {
                Some((edge.child, 1))
            } else {
                Some((edge.parent, -1))
            }
        })
        .collect()
}

/// Members connected to `start` through generation-bearing edges,
/// including `start`.
fn component_of(graph: &FamilyTreeGraph, start: Id, policy: AncestryPolicy) -> HashSet<Id> {
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        for (next, _) in generation_neighbours(graph, current, policy) {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

struct Plan {
    assignments: Vec<(Id, i32, GenerationSource)>,
    conflicts: Vec<GenerationConflict>,
}

/// Generations reached by one breadth-first pass, plus every member some
/// edge disagreed with.
struct Propagation {
    assigned: HashMap<Id, i32>,
    demanded: HashMap<Id, BTreeSet<i32>>,
}

/// One BFS from `anchor`. Pinned members and members in `held` keep their
/// current generation and propagate from it.
fn propagate(
    graph: &FamilyTreeGraph,
    anchor: &FamilyMember,
    held: &HashSet<Id>,
    policy: AncestryPolicy,
) -> Propagation {
    let mut assigned: HashMap<Id, i32> = HashMap::from([(anchor.id, anchor.position.generation)]);
    let mut demanded: HashMap<Id, BTreeSet<i32>> = HashMap::new();
    let mut queue = VecDeque::from([anchor.id]);

    while let Some(current) = queue.pop_front() {
        let base = assigned[&current];
        for (next, offset) in generation_neighbours(graph, current, policy) {
            let Some(member) = graph.member(next) else {
                continue;
            };
            let wanted = base + offset;
            match assigned.get(&next) {
                None => {
                    let value = if member.is_generation_pinned() || held.contains(&next) {
                        member.position.generation
                    } else {
                        wanted
                    };
                    if value != wanted {
                        demanded.entry(next).or_default().extend([value, wanted]);
                    }
                    assigned.insert(next, value);
                    queue.push_back(next);
                }
                Some(&existing) if existing != wanted => {
                    demanded.entry(next).or_default().extend([existing, wanted]);
                }
                Some(_) => {}
            }
        }
    }

    Propagation { assigned, demanded }
}

/// Propagate generations outward from the component's anchor.
///
/// The anchor is the earliest-inserted pinned member, or the earliest
/// inserted member when none is pinned. A conflicted member keeps its
/// previous generation, so the pass is repeated with it held there until no
/// new conflicts appear. Every member is then derived from values that are
/// actually stored, and every edge left inconsistent has a flagged end.
fn plan_component(
    graph: &FamilyTreeGraph,
    component: &HashSet<Id>,
    policy: AncestryPolicy,
) -> Option<Plan> {
    let in_component = move || graph.members().filter(move |m| component.contains(&m.id));
    let anchor = in_component()
        .find(|m| m.is_generation_pinned())
        .or_else(|| in_component().next())?;

    let mut held: HashSet<Id> = HashSet::new();
    let pass = loop {
        let pass = propagate(graph, anchor, &held, policy);
        let before = held.len();
        held.extend(pass.demanded.keys().copied());
        if held.len() == before {
            break pass;
        }
    };

    let mut conflicts = Vec::new();
    let mut assignments = Vec::new();
    for member in in_component() {
        let Some(&value) = pass.assigned.get(&member.id) else {
            continue;
        };
        if let Some(candidates) = pass.demanded.get(&member.id) {
            conflicts.push(GenerationConflict {
                member_id: member.id,
                candidates: candidates.iter().copied().collect(),
                kept: member.position.generation,
            });
            continue;
        }
        if member.is_generation_pinned() {
            continue;
        }
        let source = if member.id == anchor.id {
            GenerationSource::Anchor
        } else {
            GenerationSource::Derived
        };
        assignments.push((member.id, value, source));
    }

    Some(Plan {
        assignments,
        conflicts,
    })
}

/// Re-resolve generations for the components containing `seeds`.
///
/// Members with no generation-bearing edges are left as they are. Returns
/// the conflicts found; the graph is updated regardless.
pub(crate) fn resolve(graph: &mut FamilyTreeGraph, seeds: &[Id]) -> Vec<GenerationConflict> {
    let policy = graph.config().ancestry;
    let mut visited: HashSet<Id> = HashSet::new();
    let mut touched: Vec<Id> = Vec::new();
    let mut warnings = Vec::new();

    for &seed in seeds {
        if visited.contains(&seed) || !graph.contains_member(seed) {
            continue;
        }
        let component = component_of(graph, seed, policy);
        visited.extend(component.iter().copied());
        if component.len() < 2 {
            continue;
        }
        let Some(plan) = plan_component(graph, &component, policy) else {
            continue;
        };
        for (member_id, generation, source) in plan.assignments {
            if let Some(member) = graph.member_mut(member_id) {
                member.position.generation = generation;
                member.generation_source = source;
            }
        }
        for conflict in &plan.conflicts {
            tracing::warn!(
                tree_id = %graph.id(),
                member_id = %conflict.member_id,
                candidates = ?conflict.candidates,
                kept = conflict.kept,
                "Conflicting generation paths"
            );
        }
        warnings.extend(plan.conflicts);
        touched.extend(component);
    }

    if !touched.is_empty() {
        apply_default_positions(graph, &touched);
        tracing::debug!(
            tree_id = %graph.id(),
            members = touched.len(),
            conflicts = warnings.len(),
            "Generations resolved"
        );
    }
    warnings
}

/// Recompute default x/y for the given members unless they were placed by
/// hand. y follows the generation; x is the member's slot among members of
/// the same generation in insertion order.
pub(crate) fn apply_default_positions(graph: &mut FamilyTreeGraph, member_ids: &[Id]) {
    let layout = graph.config().layout;
    let targets: HashSet<Id> = member_ids.iter().copied().collect();

    let mut slots_used: HashMap<i32, usize> = HashMap::new();
    let mut placements = Vec::new();
    for member in graph.members() {
        let slot = slots_used.entry(member.position.generation).or_insert(0);
        if targets.contains(&member.id) && !member.manually_placed {
            placements.push((
                member.id,
                *slot as f64 * layout.member_spacing,
                member.position.generation as f64 * layout.generation_spacing,
            ));
        }
        *slot += 1;
    }

    for (member_id, x, y) in placements {
        if let Some(member) = graph.member_mut(member_id) {
            member.position.x = x;
            member.position.y = y;
        }
    }
}
