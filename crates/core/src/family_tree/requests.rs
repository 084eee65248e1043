//! Request payloads accepted from the application layer.
//!
//! Field absence on update requests means "leave unchanged". Nullable fields
//! use `Option<Option<T>>`: absent = unchanged, `null` = clear.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::family_tree::model::{Gender, RelationshipType};
use crate::types::{Date, Id, Timestamp, UserId};

/// Maximum length of a tree or member name.
pub const MAX_NAME_LENGTH: u64 = 100;

/// Maximum length of a tree description.
pub const MAX_DESCRIPTION_LENGTH: u64 = 1000;

/// Maximum length of free-text notes.
pub const MAX_NOTES_LENGTH: u64 = 2000;

/// Maximum length of an opaque photo reference.
pub const MAX_PHOTO_REF_LENGTH: u64 = 2048;

/// Maximum number of users a tree can be shared with.
pub const MAX_ALLOWED_USERS: usize = 100;

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn validate_nullable_text(
    value: &Option<Option<String>>,
    field: &str,
    max: u64,
) -> Result<(), CoreError> {
    if let Some(Some(text)) = value {
        if text.chars().count() as u64 > max {
            return Err(CoreError::Validation(format!(
                "{field} must not exceed {max} characters"
            )));
        }
    }
    Ok(())
}

fn require_trimmed_name(name: &str, what: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(format!("{what} must not be blank")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateFamilyTreeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

impl CreateFamilyTreeRequest {
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()?;
        require_trimmed_name(&self.name, "Tree name")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateFamilyTreeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
}

impl UpdateFamilyTreeRequest {
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()?;
        if let Some(name) = &self.name {
            require_trimmed_name(name, "Tree name")?;
        }
        validate_nullable_text(&self.description, "description", MAX_DESCRIPTION_LENGTH)
    }
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Explicit placement supplied by the user. Any coordinate given marks the
/// member as manually placed; a generation given pins it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionInput {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub generation: Option<i32>,
}

impl PositionInput {
    pub fn places_manually(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }

    fn check(&self) -> Result<(), CoreError> {
        for (axis, value) in [("x", self.x), ("y", self.y)] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(CoreError::Validation(format!(
                        "position.{axis} must be a finite number"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AddFamilyMemberRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 100))]
    pub name_kana: Option<String>,
    pub date_of_birth: Option<Date>,
    pub date_of_death: Option<Date>,
    #[serde(default)]
    pub gender: Gender,
    /// Defaults to `true` unless a death date is given.
    pub is_alive: Option<bool>,
    #[validate(length(max = 2048))]
    pub profile_photo: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub position: Option<PositionInput>,
}

impl AddFamilyMemberRequest {
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()?;
        require_trimmed_name(&self.name, "Member name")?;
        if let Some(position) = &self.position {
            position.check()?;
        }
        check_life_dates(self.resolved_is_alive(), self.date_of_birth, self.date_of_death)
    }

    pub fn resolved_is_alive(&self) -> bool {
        self.is_alive.unwrap_or(self.date_of_death.is_none())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateFamilyMemberRequest {
    /// Present only to be rejected when it differs: members never move
    /// between trees.
    pub family_tree_id: Option<Id>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub name_kana: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub date_of_birth: Option<Option<Date>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub date_of_death: Option<Option<Date>>,
    pub gender: Option<Gender>,
    pub is_alive: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub profile_photo: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
    pub position: Option<PositionInput>,
    /// Clears a pinned generation so the resolver owns it again.
    #[serde(default)]
    pub unpin_generation: bool,
    /// Clears manual placement so the resolver lays the member out again.
    #[serde(default)]
    pub reset_placement: bool,
}

impl UpdateFamilyMemberRequest {
    /// Shape checks that need no current state. Life-date consistency is
    /// checked by the store against the merged record.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()?;
        if let Some(name) = &self.name {
            require_trimmed_name(name, "Member name")?;
        }
        validate_nullable_text(&self.name_kana, "name_kana", MAX_NAME_LENGTH)?;
        validate_nullable_text(&self.profile_photo, "profile_photo", MAX_PHOTO_REF_LENGTH)?;
        validate_nullable_text(&self.notes, "notes", MAX_NOTES_LENGTH)?;
        if let Some(position) = &self.position {
            position.check()?;
            if self.unpin_generation && position.generation.is_some() {
                return Err(CoreError::Validation(
                    "Cannot both pin and unpin the generation".to_string(),
                ));
            }
            if self.reset_placement && position.places_manually() {
                return Err(CoreError::Validation(
                    "Cannot both place and reset the position".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A living member has no death date; a death date never precedes birth.
pub fn check_life_dates(
    is_alive: bool,
    date_of_birth: Option<Date>,
    date_of_death: Option<Date>,
) -> Result<(), CoreError> {
    if is_alive && date_of_death.is_some() {
        return Err(CoreError::Validation(
            "A living member cannot have a date of death".to_string(),
        ));
    }
    if let (Some(birth), Some(death)) = (date_of_birth, date_of_death) {
        if death < birth {
            return Err(CoreError::Validation(format!(
                "Date of death {death} precedes date of birth {birth}"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddFamilyRelationshipRequest {
    pub from_member_id: Id,
    pub to_member_id: Id,
    pub relationship_type: RelationshipType,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl AddFamilyRelationshipRequest {
    pub fn new(from_member_id: Id, to_member_id: Id, relationship_type: RelationshipType) -> Self {
        Self {
            from_member_id,
            to_member_id,
            relationship_type,
            start_date: None,
            end_date: None,
            notes: None,
        }
    }

    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()?;
        check_period(self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFamilyRelationshipRequest {
    pub relationship_type: Option<RelationshipType>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub start_date: Option<Option<Date>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub end_date: Option<Option<Date>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
}

impl UpdateFamilyRelationshipRequest {
    pub fn check(&self) -> Result<(), CoreError> {
        validate_nullable_text(&self.notes, "notes", MAX_NOTES_LENGTH)
    }
}

/// A relationship period may be open at either end but never inverted.
pub fn check_period(start: Option<Date>, end: Option<Date>) -> Result<(), CoreError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(CoreError::Validation(format!(
                "End date {end} precedes start date {start}"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sharing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareTreeRequest {
    #[serde(default)]
    pub allowed_users: BTreeSet<UserId>,
    /// Token expiry; falls back to the configured TTL when absent.
    pub expires_at: Option<Timestamp>,
}

impl ShareTreeRequest {
    pub fn check(&self, now: Timestamp) -> Result<(), CoreError> {
        if self.allowed_users.len() > MAX_ALLOWED_USERS {
            return Err(CoreError::Validation(format!(
                "A tree may be shared with at most {MAX_ALLOWED_USERS} users"
            )));
        }
        if self.allowed_users.iter().any(|u| u.trim().is_empty()) {
            return Err(CoreError::Validation(
                "Allowed user ids must not be blank".to_string(),
            ));
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return Err(CoreError::Validation(
                    "Share expiry must be in the future".to_string(),
                ));
            }
        }
        Ok(())
    }
}
