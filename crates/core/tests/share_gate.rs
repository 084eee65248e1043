//! Share gate behaviour through the registry.

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::{add_member, owner, registry_with_tree, OWNER};
use ending_note_core::config::FamilyTreeConfig;
use ending_note_core::error::CoreError;
use ending_note_core::family_tree::requests::{ShareTreeRequest, UpdateFamilyTreeRequest};
use ending_note_core::family_tree::share::{can_access, check_access};
use ending_note_core::family_tree::{AccessLevel, Bearer};

#[test]
fn test_owner_has_access_to_unshared_tree() {
    let (registry, tree) = registry_with_tree(FamilyTreeConfig::default());
    let snapshot = registry.snapshot(tree, &owner()).unwrap();
    assert!(!snapshot.tree.share_settings.is_shared);
    assert!(can_access(&snapshot.tree, &owner(), AccessLevel::Write, Utc::now()));
}

#[test]
fn test_non_owner_denied_on_unshared_tree() {
    let (registry, tree) = registry_with_tree(FamilyTreeConfig::default());
    let stranger = Bearer::user("stranger");
    assert_matches!(registry.snapshot(tree, &stranger), Err(CoreError::AccessDenied(_)));
    assert_matches!(
        registry.update_tree(tree, &stranger, None, UpdateFamilyTreeRequest::default()),
        Err(CoreError::AccessDenied(_))
    );
}

#[test]
fn test_expired_token_reports_token_expired() {
    let (registry, tree) = registry_with_tree(FamilyTreeConfig::default());
    let shared = registry
        .share_tree(
            tree,
            &owner(),
            None,
            ShareTreeRequest {
                allowed_users: Default::default(),
                expires_at: Some(Utc::now() + Duration::hours(1)),
            },
        )
        .unwrap();
    let token = Bearer::token(shared.value.share_token.clone().unwrap());
    let tree_record = shared.tree.tree;

    assert!(check_access(&tree_record, &token, AccessLevel::Read, Utc::now()).is_ok());
    let later = Utc::now() + Duration::hours(2);
    assert_matches!(
        check_access(&tree_record, &token, AccessLevel::Read, later),
        Err(CoreError::TokenExpired { .. })
    );
}

#[test]
fn test_share_rejects_past_expiry_and_keeps_version() {
    let (registry, tree) = registry_with_tree(FamilyTreeConfig::default());
    let version = registry.snapshot(tree, &owner()).unwrap().tree.version;
    let err = registry
        .share_tree(
            tree,
            &owner(),
            None,
            ShareTreeRequest {
                allowed_users: Default::default(),
                expires_at: Some(Utc::now() - Duration::minutes(1)),
            },
        )
        .unwrap_err();
    assert!(err.is_validation_failure());
    assert_eq!(registry.snapshot(tree, &owner()).unwrap().tree.version, version);
}

#[test]
fn test_configured_ttl_applies_when_request_has_no_expiry() {
    let mut config = FamilyTreeConfig::default();
    config.share.default_ttl_hours = Some(48);
    let (registry, tree) = registry_with_tree(config);
    let before = Utc::now();
    let shared = registry
        .share_tree(tree, &owner(), None, ShareTreeRequest::default())
        .unwrap();
    let expires_at = shared.value.expires_at.expect("ttl applied");
    assert!(expires_at >= before + Duration::hours(48));
    assert!(expires_at <= Utc::now() + Duration::hours(48));
}

#[test]
fn test_token_reader_can_export_but_not_write() {
    let (registry, tree) = registry_with_tree(FamilyTreeConfig::default());
    add_member(&registry, tree, "A");
    let shared = registry
        .share_tree(tree, &owner(), None, ShareTreeRequest::default())
        .unwrap();
    let reader = Bearer::token(shared.value.share_token.unwrap());

    let export = registry.export(tree, &reader).unwrap();
    assert_eq!(export.members.len(), 1);
    assert_matches!(
        registry.unshare_tree(tree, &reader, None),
        Err(CoreError::AccessDenied(_))
    );
    assert_eq!(
        registry.snapshot(tree, &owner()).unwrap().tree.last_modified_by,
        OWNER
    );
}
