// crates/miniapp-core/tests/core_types.rs
// ============================================================================
// Module: Core Type Tests
// Description: Identifier, label, and input limit behavior.
// Purpose: Ensure wire forms are stable and validation fails closed.
// ============================================================================

//! ## Overview
//! Unit-level tests for core invariants:
//! - Admin identity and identifier conversions
//! - Stable access action labels
//! - Slug, key, comment, and HTML limits (including property checks)

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

use miniapp_core::AccessAction;
use miniapp_core::InputLimits;
use miniapp_core::UserId;
use miniapp_core::ValidationError;
use proptest::prelude::*;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

#[test]
fn admin_identity_is_one() {
    assert_eq!(UserId::ADMIN.get(), 1);
    assert!(UserId::ADMIN.is_admin());
    assert!(!UserId::from_raw(2).expect("nonzero").is_admin());
}

#[test]
fn user_id_rejects_zero_and_negative_values() {
    assert!(UserId::from_raw(0).is_none());
    assert!(UserId::from_i64(0).is_none());
    assert!(UserId::from_i64(-4).is_none());
    assert_eq!(UserId::from_i64(9).map(UserId::as_i64), Some(9));
}

#[test]
fn user_id_serializes_as_number() {
    let json = serde_json::to_string(&UserId::from_raw(42).expect("nonzero")).unwrap();
    assert_eq!(json, "42");
}

// ============================================================================
// SECTION: Access Actions
// ============================================================================

#[test]
fn access_action_labels_are_stable() {
    assert_eq!(AccessAction::Generate.as_str(), "generate");
    assert_eq!(AccessAction::ViewStateless.as_str(), "view_stateless");
    assert_eq!(AccessAction::ViewPersistent.as_str(), "view_persistent");
    assert_eq!(AccessAction::parse("view_persistent"), Some(AccessAction::ViewPersistent));
    assert_eq!(AccessAction::parse("delete"), None);
}

#[test]
fn access_action_serde_matches_label() {
    for action in AccessAction::ALL {
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, format!("\"{}\"", action.as_str()));
    }
}

// ============================================================================
// SECTION: Input Limits
// ============================================================================

#[test]
fn slug_rejects_empty_and_path_characters() {
    let limits = InputLimits::default();
    assert_eq!(limits.slug(""), Err(ValidationError::Empty("slug")));
    assert_eq!(limits.slug("a/b"), Err(ValidationError::InvalidCharacters("slug")));
    assert_eq!(limits.slug("hello world"), Err(ValidationError::InvalidCharacters("slug")));
    assert_eq!(limits.slug("my-app_v1.2").unwrap().as_str(), "my-app_v1.2");
}

#[test]
fn slug_rejects_overlong_values() {
    let limits = InputLimits {
        max_slug_length: 4,
        ..InputLimits::default()
    };
    assert!(matches!(
        limits.slug("abcde"),
        Err(ValidationError::TooLong {
            field: "slug",
            max: 4,
            actual: 5
        })
    ));
}

#[test]
fn lookup_slug_only_bounds_length() {
    let limits = InputLimits {
        max_slug_length: 16,
        ..InputLimits::default()
    };
    assert_eq!(limits.lookup_slug("my game").unwrap().as_str(), "my game");
    assert_eq!(limits.lookup_slug("игра").unwrap().as_str(), "игра");
    assert_eq!(limits.lookup_slug(""), Err(ValidationError::Empty("slug")));
    assert!(matches!(
        limits.lookup_slug("a-very-long-legacy-slug"),
        Err(ValidationError::TooLong {
            field: "slug",
            ..
        })
    ));
    assert_eq!(limits.slug("my game"), Err(ValidationError::InvalidCharacters("slug")));
}

#[test]
fn key_rejects_whitespace() {
    let limits = InputLimits::default();
    assert!(limits.key("mini-key").is_ok());
    assert_eq!(limits.key("bad key"), Err(ValidationError::InvalidCharacters("key")));
    assert_eq!(limits.key(""), Err(ValidationError::Empty("key")));
}

#[test]
fn html_and_comment_limits_apply() {
    let limits = InputLimits {
        max_html_bytes: 8,
        max_comment_length: 3,
        ..InputLimits::default()
    };
    assert!(limits.html("").is_ok());
    assert!(limits.html("<p>ok</p>").is_err());
    assert!(limits.comment(None).is_ok());
    assert!(limits.comment(Some("abc")).is_ok());
    assert!(limits.comment(Some("abcd")).is_err());
}

proptest! {
    #[test]
    fn slug_accepts_generated_safe_slugs(raw in "[A-Za-z0-9._-]{1,128}") {
        let limits = InputLimits::default();
        let slug = limits.slug(&raw).unwrap();
        prop_assert_eq!(slug.as_str(), raw.as_str());
    }

    #[test]
    fn slug_rejects_any_unsafe_byte(prefix in "[a-z]{0,8}", bad in "[/ ?#%<>]", suffix in "[a-z]{0,8}") {
        let limits = InputLimits::default();
        let raw = format!("{prefix}{bad}{suffix}");
        prop_assert_eq!(limits.slug(&raw), Err(ValidationError::InvalidCharacters("slug")));
    }
}
