use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};
use ending_note_core::family_tree::queries::Relative;
use ending_note_core::family_tree::{
    Bearer, FamilyTreeExport, FamilyTreeRegistry, FamilyTreeSnapshot, GenerationConflict,
    ImportReport, RelationshipType,
};
use ending_note_core::types::Id;
use serde::Serialize;

use crate::Relation;

#[derive(Debug, Serialize)]
pub struct Resolved {
    pub tree: FamilyTreeSnapshot,
    pub warnings: Vec<GenerationConflict>,
}

/// One relative in `query` output.
#[derive(Debug, Serialize)]
pub struct RelativeView {
    pub member_id: Id,
    pub name: String,
    pub generation: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<RelationshipType>,
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read export from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Parse an export file and import it as a new tree owned by `owner`.
pub fn import(
    registry: &FamilyTreeRegistry,
    owner: &str,
    path: &Path,
) -> anyhow::Result<(Id, ImportReport)> {
    let raw = read_source(path)?;
    let export: FamilyTreeExport = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a family tree export", path.display()))?;
    let (snapshot, report) = registry.import_tree(&owner.to_string(), export)?;
    tracing::info!(
        tree_id = %snapshot.tree.id,
        name = %snapshot.tree.name,
        rejected = report.rejected.len(),
        "Export file loaded"
    );
    Ok((snapshot.tree.id, report))
}

/// Relatives of the member called `name`. The name must be unique in the tree.
pub fn query(
    registry: &FamilyTreeRegistry,
    tree_id: Id,
    bearer: &Bearer,
    name: &str,
    relation: Relation,
) -> anyhow::Result<Vec<RelativeView>> {
    let views = registry.read(tree_id, bearer, |graph| {
        let matches: Vec<Id> = graph
            .members()
            .filter(|m| m.name == name)
            .map(|m| m.id)
            .collect();
        let member_id = match matches.as_slice() {
            [only] => *only,
            _ => return Ok(Err(matches.len())),
        };

        let related: Vec<(Id, Option<RelationshipType>)> = match relation {
            Relation::Parents => typed(graph.parents_of(member_id)?),
            Relation::Children => typed(graph.children_of(member_id)?),
            Relation::Spouses => typed(graph.spouses_of(member_id)?),
            Relation::Siblings => typed(graph.siblings_of(member_id)?),
            Relation::Ancestors => untyped(graph.ancestors_of(member_id)?),
            Relation::Descendants => untyped(graph.descendants_of(member_id)?),
        };

        Ok(Ok(related
            .into_iter()
            .filter_map(|(id, relationship_type)| {
                graph.member(id).map(|m| RelativeView {
                    member_id: id,
                    name: m.name.clone(),
                    generation: m.position.generation,
                    relationship_type,
                })
            })
            .collect::<Vec<_>>()))
    })?;

    match views {
        Ok(views) => Ok(views),
        Err(0) => bail!("no member named {name:?}"),
        Err(n) => bail!("{n} members are named {name:?}; names must be unique to query"),
    }
}

fn typed(relatives: Vec<Relative>) -> Vec<(Id, Option<RelationshipType>)> {
    relatives
        .into_iter()
        .map(|r| (r.member_id, Some(r.relationship_type)))
        .collect()
}

fn untyped(ids: Vec<Id>) -> Vec<(Id, Option<RelationshipType>)> {
    ids.into_iter().map(|id| (id, None)).collect()
}
