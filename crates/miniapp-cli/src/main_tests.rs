// crates/miniapp-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Tests
// Description: Argument parsing and command execution against a temp store.
// Purpose: Ensure operator commands parse strictly and run end to end.
// Dependencies: miniapp-cli main helpers, tempfile
// ============================================================================

//! ## Overview
//! Parses representative command lines and drives the dispatcher against a
//! temporary configuration.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use miniapp_core::AccessAction;
use miniapp_core::UnixMillis;
use miniapp_core::UsageStats;
use miniapp_core::User;
use miniapp_core::UserId;
use tempfile::TempDir;

use super::AppCommand;
use super::Cli;
use super::Commands;
use super::UserCommand;
use super::parse_user_id;
use super::run;
use super::user_rows;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(std::iter::once("miniapp").chain(args.iter().copied()))
}

fn write_config(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("miniapp.toml");
    let store = dir.path().join("apps.db");
    let content = format!(
        "[store]\npath = {store:?}\n\n[admin]\nkey = \"cli-admin-secret\"\n\n[audit]\nenabled = \
         false\n",
        store = store.display().to_string()
    );
    fs::write(&path, content).expect("write config");
    path
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn user_add_parses_key_and_comment() {
    let cli = parse(&["user", "add", "--key", "k-1", "--comment", "first"]).expect("parse");
    match cli.command {
        Commands::User {
            command: UserCommand::Add(add),
        } => {
            assert_eq!(add.key, "k-1");
            assert_eq!(add.comment.as_deref(), Some("first"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn config_flag_is_global() {
    let cli = parse(&["stats", "--config", "/tmp/miniapp.toml"]).expect("parse");
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/miniapp.toml")));
    assert!(matches!(cli.command, Commands::Stats));
}

#[test]
fn app_list_owner_must_be_positive() {
    let cli = parse(&["app", "list", "--owner", "3"]).expect("parse");
    match cli.command {
        Commands::App {
            command: AppCommand::List(list),
        } => assert_eq!(list.owner, UserId::from_raw(3)),
        other => panic!("unexpected command: {other:?}"),
    }
    assert!(parse(&["app", "list", "--owner", "0"]).is_err());
    assert!(parse(&["app", "list", "--owner", "-2"]).is_err());
    assert!(parse_user_id("abc").is_err());
}

#[test]
fn missing_or_unknown_commands_are_rejected() {
    assert!(parse(&[]).is_err());
    assert!(parse(&["serve"]).is_err());
    assert!(parse(&["user", "add"]).is_err());
    assert!(parse(&["events", "--limit", "0"]).is_err());
}

// ============================================================================
// SECTION: Output
// ============================================================================

#[test]
fn user_rows_hide_keys_unless_requested() {
    let user = User {
        id: UserId::from_raw(2).expect("nonzero"),
        key: "secret".to_string(),
        comment: None,
        created_at: UnixMillis::new(10),
    };
    let mut stats = UsageStats::new();
    stats.add_action(user.id, AccessAction::Generate, 4);

    let hidden = user_rows(vec![user.clone()], &stats, false);
    assert!(hidden[0].key.is_none());
    assert_eq!(hidden[0].stats.generated, 4);
    let rendered = serde_json::to_string(&hidden).expect("json");
    assert!(!rendered.contains("secret"));

    let shown = user_rows(vec![user], &stats, true);
    assert_eq!(shown[0].key.as_deref(), Some("secret"));
}

// ============================================================================
// SECTION: Execution
// ============================================================================

#[test]
fn commands_run_against_a_temporary_store() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);
    let config = config.to_str().expect("utf-8 path");

    let steps: [&[&str]; 7] = [
        &["init", "--config", config],
        &["user", "add", "--key", "tenant-key", "--config", config],
        &["user", "list", "--config", config],
        &["app", "list", "--owner", "2", "--config", config],
        &["stats", "--config", config],
        &["events", "--limit", "5", "--config", config],
        &["config", "validate", "--config", config],
    ];
    for args in steps {
        let cli = parse(args).expect("parse");
        assert!(run(cli).is_ok(), "{args:?}");
    }

    let duplicate = parse(&["user", "add", "--key", "tenant-key", "--config", config]).expect("parse");
    let err = run(duplicate).expect_err("duplicate key");
    assert!(err.to_string().contains("key already exists"));
}
