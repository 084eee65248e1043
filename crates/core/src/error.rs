use serde::Serialize;

use crate::family_tree::model::RelationshipType;
use crate::types::{Id, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: Id },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Member {member_id} does not belong to family tree {tree_id}")]
    CrossTreeReference { member_id: Id, tree_id: Id },

    #[error("Member {member_id} cannot be related to itself")]
    SelfRelationship { member_id: Id },

    #[error(
        "Cannot record {requested} between {from_member_id} and {to_member_id}: \
         existing {existing_type} relationship {existing_id} conflicts"
    )]
    ConflictingRelationship {
        from_member_id: Id,
        to_member_id: Id,
        requested: RelationshipType,
        existing_id: Id,
        existing_type: RelationshipType,
    },

    #[error("Member {child_id} is already an ancestor of {parent_id}; the edge would create a cycle")]
    CycleDetected { parent_id: Id, child_id: Id },

    #[error("Stale version: expected {expected}, tree is at {actual}")]
    StaleVersion { expected: u64, actual: u64 },

    #[error("Share token expired at {expired_at}")]
    TokenExpired { expired_at: Timestamp },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wire code for this error, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Validation(_) => "VALIDATION_FAILED",
            CoreError::CrossTreeReference { .. } => "CROSS_TREE_REFERENCE",
            CoreError::SelfRelationship { .. } => "SELF_RELATIONSHIP",
            CoreError::ConflictingRelationship { .. } => "CONFLICTING_RELATIONSHIP",
            CoreError::CycleDetected { .. } => "CYCLE_DETECTED",
            CoreError::StaleVersion { .. } => "STALE_VERSION",
            CoreError::TokenExpired { .. } => "TOKEN_EXPIRED",
            CoreError::AccessDenied(_) => "ACCESS_DENIED",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for request-shape problems and every rule the consistency
    /// validator enforces.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            CoreError::Validation(_)
                | CoreError::SelfRelationship { .. }
                | CoreError::ConflictingRelationship { .. }
                | CoreError::CycleDetected { .. }
        )
    }

    /// Member ids the error is about, in the order they appear in the message.
    pub fn member_ids(&self) -> Vec<Id> {
        match self {
            CoreError::CrossTreeReference { member_id, .. }
            | CoreError::SelfRelationship { member_id } => vec![*member_id],
            CoreError::ConflictingRelationship {
                from_member_id,
                to_member_id,
                ..
            } => vec![*from_member_id, *to_member_id],
            CoreError::CycleDetected {
                parent_id,
                child_id,
            } => vec![*parent_id, *child_id],
            CoreError::NotFound { entity, id } if *entity == "FamilyMember" => vec![*id],
            _ => Vec::new(),
        }
    }

    /// Relationship ids the error is about.
    pub fn relationship_ids(&self) -> Vec<Id> {
        match self {
            CoreError::ConflictingRelationship { existing_id, .. } => vec![*existing_id],
            CoreError::NotFound { entity, id } if *entity == "FamilyRelationship" => vec![*id],
            _ => Vec::new(),
        }
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CoreError::Validation(errors.to_string())
    }
}

/// Caller-facing error body: a code, a human-readable message and the
/// offending ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub member_ids: Vec<Id>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationship_ids: Vec<Id>,
}

impl From<&CoreError> for ErrorResponse {
    fn from(err: &CoreError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            member_ids: err.member_ids(),
            relationship_ids: err.relationship_ids(),
        }
    }
}
