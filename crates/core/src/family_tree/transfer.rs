//! Portable JSON envelope for moving a tree between installations.
//!
//! Import never bypasses validation: every member and relationship is
//! replayed through the ordinary graph operations. Records that fail are
//! reported, not fatal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::FamilyTreeConfig;
use crate::error::CoreError;
use crate::family_tree::generation::{self, GenerationConflict};
use crate::family_tree::model::{Gender, GenerationSource, Position, RelationshipType};
use crate::family_tree::requests::{
    AddFamilyMemberRequest, AddFamilyRelationshipRequest, CreateFamilyTreeRequest, PositionInput,
};
use crate::family_tree::store::FamilyTreeGraph;
use crate::family_tree::validator::LocalMembersOnly;
use crate::types::{Date, Id, Timestamp, UserId};

/// Highest envelope version this build reads and the one it writes.
pub const EXPORT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyTreeExport {
    pub format_version: u32,
    pub exported_at: Timestamp,
    pub exported_by: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<ExportedMember>,
    #[serde(default)]
    pub relationships: Vec<ExportedRelationship>,
}

/// A member as exported. `id` is only meaningful inside the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedMember {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub name_kana: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<Date>,
    #[serde(default)]
    pub date_of_death: Option<Date>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub is_alive: Option<bool>,
    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub manually_placed: bool,
    #[serde(default)]
    pub generation_source: GenerationSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedRelationship {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    pub from_member_id: Id,
    pub to_member_id: Id,
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub start_date: Option<Date>,
    #[serde(default)]
    pub end_date: Option<Date>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Member,
    Relationship,
}

/// A record the import skipped, with the error it raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    pub kind: RecordKind,
    /// Position of the record in its envelope list.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_id: Option<Id>,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub tree_id: Id,
    pub member_count: usize,
    pub relationship_count: usize,
    pub rejected: Vec<RejectedRecord>,
    /// Generation conflicts left after the final resolver pass.
    pub warnings: Vec<GenerationConflict>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.warnings.is_empty()
    }
}

/// Build the export envelope for `graph`.
pub fn export_graph(graph: &FamilyTreeGraph, exported_by: UserId) -> FamilyTreeExport {
    let tree = graph.tree();
    FamilyTreeExport {
        format_version: EXPORT_FORMAT_VERSION,
        exported_at: chrono::Utc::now(),
        exported_by,
        name: tree.name.clone(),
        description: tree.description.clone(),
        members: graph
            .members()
            .map(|m| ExportedMember {
                id: m.id,
                name: m.name.clone(),
                name_kana: m.name_kana.clone(),
                date_of_birth: m.date_of_birth,
                date_of_death: m.date_of_death,
                gender: m.gender,
                is_alive: Some(m.is_alive),
                profile_photo: m.profile_photo.clone(),
                notes: m.notes.clone(),
                position: Some(m.position),
                manually_placed: m.manually_placed,
                generation_source: m.generation_source,
            })
            .collect(),
        relationships: graph
            .relationships()
            .map(|r| ExportedRelationship {
                id: Some(r.id),
                from_member_id: r.from_member_id,
                to_member_id: r.to_member_id,
                relationship_type: r.relationship_type,
                start_date: r.start_date,
                end_date: r.end_date,
                notes: r.notes.clone(),
            })
            .collect(),
    }
}

fn member_request(member: &ExportedMember) -> AddFamilyMemberRequest {
    let position = member.position.map(|p| PositionInput {
        x: member.manually_placed.then_some(p.x),
        y: member.manually_placed.then_some(p.y),
        generation: (member.generation_source == GenerationSource::Pinned).then_some(p.generation),
    });
    AddFamilyMemberRequest {
        name: member.name.clone(),
        name_kana: member.name_kana.clone(),
        date_of_birth: member.date_of_birth,
        date_of_death: member.date_of_death,
        gender: member.gender,
        is_alive: member.is_alive,
        profile_photo: member.profile_photo.clone(),
        notes: member.notes.clone(),
        position,
    }
}

fn reject(
    kind: RecordKind,
    index: usize,
    original_id: Option<Id>,
    err: &CoreError,
) -> RejectedRecord {
    RejectedRecord {
        kind,
        index,
        original_id,
        code: err.code(),
        message: err.to_string(),
    }
}

/// Replay `export` into a new tree owned by `owner`.
///
/// Only an unreadable envelope or an invalid tree name fails the import as
/// a whole.
pub fn import_graph(
    owner: UserId,
    export: FamilyTreeExport,
    config: FamilyTreeConfig,
) -> Result<(FamilyTreeGraph, ImportReport), CoreError> {
    if export.format_version == 0 || export.format_version > EXPORT_FORMAT_VERSION {
        return Err(CoreError::Validation(format!(
            "Unsupported export format version {} (expected 1..={EXPORT_FORMAT_VERSION})",
            export.format_version
        )));
    }

    let mut graph = FamilyTreeGraph::create(
        owner.clone(),
        CreateFamilyTreeRequest {
            name: export.name,
            description: export.description,
        },
        config,
    )?;

    let mut rejected = Vec::new();
    let mut id_map: HashMap<Id, Id> = HashMap::with_capacity(export.members.len());

    for (index, member) in export.members.iter().enumerate() {
        if id_map.contains_key(&member.id) {
            let err = CoreError::Validation(format!("Duplicate member id {}", member.id));
            rejected.push(reject(RecordKind::Member, index, Some(member.id), &err));
            continue;
        }
        // Unpinned members start from their exported generation.
        let seed = member.position.map(|p| (p.generation, member.generation_source));
        match graph.add_member_seeded(&owner, member_request(member), seed) {
            Ok(added) => {
                id_map.insert(member.id, added.value.id);
            }
            Err(err) => rejected.push(reject(RecordKind::Member, index, Some(member.id), &err)),
        }
    }

    for (index, rel) in export.relationships.iter().enumerate() {
        let lookup = |original: Id| {
            id_map.get(&original).copied().ok_or(CoreError::NotFound {
                entity: "FamilyMember",
                id: original,
            })
        };
        let outcome = lookup(rel.from_member_id)
            .and_then(|from| Ok((from, lookup(rel.to_member_id)?)))
            .and_then(|(from, to)| {
                let req = AddFamilyRelationshipRequest {
                    start_date: rel.start_date,
                    end_date: rel.end_date,
                    notes: rel.notes.clone(),
                    ..AddFamilyRelationshipRequest::new(from, to, rel.relationship_type)
                };
                graph.add_relationship(&owner, req, &LocalMembersOnly)
            });
        if let Err(err) = outcome {
            rejected.push(reject(RecordKind::Relationship, index, rel.id, &err));
        }
    }

    let all: Vec<Id> = graph.members().map(|m| m.id).collect();
    let warnings = generation::resolve(&mut graph, &all);

    let report = ImportReport {
        tree_id: graph.id(),
        member_count: graph.member_count(),
        relationship_count: graph.relationship_count(),
        rejected,
        warnings,
    };
    tracing::info!(
        tree_id = %report.tree_id,
        members = report.member_count,
        relationships = report.relationship_count,
        rejected = report.rejected.len(),
        warnings = report.warnings.len(),
        "Family tree imported"
    );
    Ok((graph, report))
}
