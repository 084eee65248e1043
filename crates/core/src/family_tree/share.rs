//! Share gate: who may read or write a tree, and share-token issuance.

use std::fmt;

use chrono::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ShareConfig;
use crate::error::CoreError;
use crate::family_tree::model::{FamilyTree, ShareSettings};
use crate::family_tree::requests::ShareTreeRequest;
use crate::types::{Timestamp, UserId};

/// Whoever is asking: an authenticated user or the holder of a share token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Bearer {
    User(UserId),
    Token(String),
}

impl Bearer {
    pub fn user(id: impl Into<UserId>) -> Self {
        Bearer::User(id.into())
    }

    pub fn token(token: impl Into<String>) -> Self {
        Bearer::Token(token.into())
    }

    /// The user id to record as `last_modified_by`. Tokens never write.
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Bearer::User(id) => Some(id),
            Bearer::Token(_) => None,
        }
    }
}

impl fmt::Display for Bearer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bearer::User(id) => write!(f, "user {id}"),
            // Never print the token itself.
            Bearer::Token(_) => f.write_str("share token"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Read,
    Write,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
        })
    }
}

/// Decide whether `bearer` may access `tree` at `access` level.
///
/// - The owner always has read and write.
/// - Nobody else has access while the tree is not shared.
/// - Allowed users have read and write on a shared tree.
/// - The exact share token grants read only, and only before `expires_at`.
///   A lapsed token yields [`CoreError::TokenExpired`].
pub fn check_access(
    tree: &FamilyTree,
    bearer: &Bearer,
    access: AccessLevel,
    now: Timestamp,
) -> Result<(), CoreError> {
    let settings = &tree.share_settings;
    let denied = || {
        tracing::debug!(tree_id = %tree.id, %bearer, %access, "Access denied");
        CoreError::AccessDenied(format!("{bearer} may not {access} family tree {}", tree.id))
    };

    match bearer {
        Bearer::User(user) if *user == tree.owner_id => Ok(()),
        _ if !settings.is_shared => Err(denied()),
        Bearer::User(user) if settings.allowed_users.contains(user) => Ok(()),
        Bearer::User(_) => Err(denied()),
        Bearer::Token(token) => {
            if settings.share_token.as_deref() != Some(token.as_str()) {
                return Err(denied());
            }
            if let Some(expired_at) = settings.expires_at.filter(|at| *at <= now) {
                tracing::warn!(tree_id = %tree.id, %expired_at, "Expired share token presented");
                return Err(CoreError::TokenExpired { expired_at });
            }
            match access {
                AccessLevel::Read => Ok(()),
                AccessLevel::Write => Err(denied()),
            }
        }
    }
}

/// Boolean form of [`check_access`].
pub fn can_access(tree: &FamilyTree, bearer: &Bearer, access: AccessLevel, now: Timestamp) -> bool {
    check_access(tree, bearer, access, now).is_ok()
}

/// Share and unshare are reserved to the owner.
pub fn require_owner(tree: &FamilyTree, bearer: &Bearer) -> Result<UserId, CoreError> {
    match bearer {
        Bearer::User(user) if *user == tree.owner_id => Ok(user.clone()),
        _ => Err(CoreError::AccessDenied(format!(
            "only the owner may change sharing of family tree {}",
            tree.id
        ))),
    }
}

/// Generate a random alphanumeric share token of `length` characters.
pub fn generate_share_token(length: usize) -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Settings for a (re-)share. A fresh token is issued every time; expiry is
/// the requested one, else `now + default_ttl_hours`, else none.
///
/// A TTL that does not fit the timestamp range is a validation error.
pub fn shared_settings(
    req: ShareTreeRequest,
    config: ShareConfig,
    now: Timestamp,
) -> Result<ShareSettings, CoreError> {
    let expires_at = match (req.expires_at, config.default_ttl_hours) {
        (Some(at), _) => Some(at),
        (None, Some(hours)) => Some(
            Duration::try_hours(hours)
                .and_then(|ttl| now.checked_add_signed(ttl))
                .ok_or_else(|| {
                    CoreError::Validation(format!("Share TTL of {hours} hours is out of range"))
                })?,
        ),
        (None, None) => None,
    };
    Ok(ShareSettings {
        is_shared: true,
        allowed_users: req.allowed_users,
        share_token: Some(generate_share_token(config.token_length)),
        expires_at,
    })
}
