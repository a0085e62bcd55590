// crates/miniapp-store-sqlite/tests/schema_migration.rs
// ============================================================================
// Module: Schema Migration Tests
// Description: Convergence from every observable store condition.
// Purpose: Ensure legacy data survives migration, recovery never duplicates,
//          and failures roll back completely.
// Dependencies: miniapp-store-sqlite, miniapp-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Each test seeds a database file with raw SQL describing one starting
//! state, runs the schema manager, and inspects the file directly.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use miniapp_core::AppScope;
use miniapp_core::AppSlug;
use miniapp_core::AppStore;
use miniapp_core::IdentityStore;
use miniapp_core::UserId;
use miniapp_store_sqlite::AdminReconcileOutcome;
use miniapp_store_sqlite::CurrentTable;
use miniapp_store_sqlite::SchemaAction;
use miniapp_store_sqlite::SchemaManager;
use miniapp_store_sqlite::SchemaOptions;
use miniapp_store_sqlite::SchemaState;
use miniapp_store_sqlite::SqliteMiniAppStore;
use miniapp_store_sqlite::SqliteStoreConfig;
use miniapp_store_sqlite::SqliteStoreError;
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Single-tenant app table as written by the original deployment.
const LEGACY_APPS: &str = "CREATE TABLE apps (
    slug TEXT PRIMARY KEY,
    html_content TEXT,
    created_at TIMESTAMP,
    updated_at TIMESTAMP
);";

/// Same layout, already renamed aside by an interrupted run.
const LEGACY_APPS_OLD: &str = "CREATE TABLE apps_old (
    slug TEXT PRIMARY KEY,
    html_content TEXT,
    created_at TIMESTAMP,
    updated_at TIMESTAMP
);";

/// Identity table with text timestamps.
const LEGACY_USERS: &str = "CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT UNIQUE NOT NULL,
    comment TEXT,
    created_at TIMESTAMP
);";

/// Tenant-aware app table.
const TENANT_APPS: &str = "CREATE TABLE apps (
    slug TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    html_content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (slug, user_id)
);";

fn seed(path: &Path, sql: &str) {
    let connection = Connection::open(path).expect("open seed connection");
    connection.execute_batch(sql).expect("seed sql");
}

fn open_store(path: &Path) -> SqliteMiniAppStore {
    SqliteMiniAppStore::open(&SqliteStoreConfig::new(path)).expect("open store")
}

fn app_rows(path: &Path) -> Vec<(String, i64, String)> {
    let connection = Connection::open(path).expect("open");
    let mut statement = connection
        .prepare("SELECT slug, user_id, html_content FROM apps ORDER BY slug, user_id")
        .expect("prepare");
    statement
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .expect("query")
        .collect::<Result<Vec<_>, _>>()
        .expect("rows")
}

fn table_exists(path: &Path, name: &str) -> bool {
    let connection = Connection::open(path).expect("open");
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [name],
            |row| row.get(0),
        )
        .expect("exists")
}

fn admin_key(path: &Path) -> Option<String> {
    let connection = Connection::open(path).expect("open");
    connection.query_row("SELECT key FROM users WHERE id = 1", [], |row| row.get(0)).ok()
}

// ============================================================================
// SECTION: Fresh and Current
// ============================================================================

#[test]
fn fresh_store_creates_all_tables_then_is_noop() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    let store = open_store(&path);

    let first = store.ensure_schema(SchemaOptions::default()).expect("first run");
    assert_eq!(first.observed, SchemaState::Fresh);
    for table in ["users", "apps", "access_logs"] {
        assert!(first.actions.contains(&SchemaAction::CreateTable {
            table
        }));
        assert!(table_exists(&path, table));
    }
    assert_eq!(first.migrated_rows, 0);
    assert_eq!(admin_key(&path), None);

    let second = store.ensure_schema(SchemaOptions::default()).expect("second run");
    assert_eq!(second.observed, SchemaState::Current);
    assert!(second.is_noop());
}

#[test]
fn current_store_only_gains_missing_access_log() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    seed(
        &path,
        &format!(
            "{LEGACY_USERS}{TENANT_APPS}
             INSERT INTO users (id, key, created_at) VALUES (1, 'admin', 0);
             INSERT INTO apps VALUES ('hello', 1, '<p>hi</p>', 10, 20);"
        ),
    );
    let store = open_store(&path);

    let report = store.ensure_schema(SchemaOptions::default()).expect("converge");
    assert_eq!(report.observed, SchemaState::Current);
    assert!(report.actions.contains(&SchemaAction::CreateTable {
        table: "access_logs"
    }));
    assert!(!report.actions.iter().any(|action| matches!(
        action,
        SchemaAction::CreateTable {
            table: "apps" | "users"
        }
    )));
    assert_eq!(app_rows(&path), vec![("hello".to_string(), 1, "<p>hi</p>".to_string())]);

    assert!(store.ensure_schema(SchemaOptions::default()).expect("rerun").is_noop());
}

#[test]
fn text_timestamps_in_current_store_become_millis() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    seed(
        &path,
        &format!(
            "{LEGACY_USERS}{TENANT_APPS}
             INSERT INTO users (id, key, created_at) VALUES (1, 'admin', '2020-01-01 09:00:00');
             INSERT INTO apps VALUES ('old', 1, 'v1', '2020-01-01 10:00:00.5',
                 '2020-01-01 10:00:00.5');
             INSERT INTO apps VALUES ('older', 1, 'v0', '2019-06-01 00:00:00',
                 '2019-06-01 00:00:00');"
        ),
    );
    let store = open_store(&path);

    let report = store.ensure_schema(SchemaOptions::default()).expect("converge");
    assert_eq!(report.observed, SchemaState::Current);
    assert!(report.actions.contains(&SchemaAction::NormalizeTimestamps {
        table: "apps",
        rows: 2
    }));
    assert!(report.actions.contains(&SchemaAction::NormalizeTimestamps {
        table: "users",
        rows: 1
    }));
    let admin = store.user_by_id(UserId::ADMIN).expect("lookup").expect("admin");
    assert_eq!(admin.created_at.get(), 1_577_869_200_000);

    let old = AppSlug::new("old");
    let before = store.fetch_app(&old, UserId::ADMIN).expect("fetch").expect("old");
    assert_eq!(before.updated_at.get(), 1_577_872_800_500);
    let older =
        store.fetch_app(&AppSlug::new("older"), UserId::ADMIN).expect("fetch").expect("older");
    assert_eq!(older.updated_at, older.created_at);

    store.upsert_app(&AppSlug::new("fresh"), UserId::ADMIN, "new").expect("insert fresh");
    let listed: Vec<String> = store
        .list_apps(AppScope::Owner(UserId::ADMIN))
        .expect("list")
        .into_iter()
        .map(|summary| summary.slug.as_str().to_string())
        .collect();
    assert_eq!(listed, vec!["fresh".to_string(), "old".to_string(), "older".to_string()]);

    store.upsert_app(&old, UserId::ADMIN, "v2").expect("update old");
    let after = store.fetch_app(&old, UserId::ADMIN).expect("fetch").expect("old");
    assert_eq!(after.html_content, "v2");
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at > before.updated_at);

    assert!(store.ensure_schema(SchemaOptions::default()).expect("rerun").is_noop());
}

// ============================================================================
// SECTION: Legacy Unmigrated
// ============================================================================

#[test]
fn legacy_rows_move_to_admin_tenant() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    seed(
        &path,
        &format!(
            "{LEGACY_APPS}
             INSERT INTO apps VALUES ('hello', '<h1>ok</h1>', '2024-01-01 12:00:00.123456',
                 '2024-01-02 12:00:00');
             INSERT INTO apps VALUES ('world', NULL, NULL, NULL);"
        ),
    );
    let store = open_store(&path);

    let report = store.ensure_schema(SchemaOptions::default()).expect("migrate");
    assert_eq!(report.observed, SchemaState::LegacyUnmigrated);
    assert_eq!(report.migrated_rows, 2);
    assert!(!table_exists(&path, "apps_old"));
    assert_eq!(admin_key(&path).as_deref(), Some("legacy-admin"));
    assert_eq!(
        app_rows(&path),
        vec![
            ("hello".to_string(), 1, "<h1>ok</h1>".to_string()),
            ("world".to_string(), 1, String::new()),
        ]
    );

    let hello = store
        .fetch_app(&AppSlug::new("hello"), UserId::ADMIN)
        .expect("fetch")
        .expect("hello present");
    assert_eq!(hello.created_at.get(), 1_704_110_400_123);
    assert_eq!(hello.updated_at.get(), 1_704_196_800_000);
    let world = store
        .fetch_app(&AppSlug::new("world"), UserId::ADMIN)
        .expect("fetch")
        .expect("world present");
    assert!(world.updated_at >= world.created_at);

    let rerun = store.ensure_schema(SchemaOptions::default()).expect("rerun");
    assert_eq!(rerun.observed, SchemaState::Current);
    assert!(rerun.is_noop());
    assert_eq!(app_rows(&path).len(), 2);
}

#[test]
fn legacy_admin_placeholder_collision_takes_first_free_suffix() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    seed(
        &path,
        &format!(
            "{LEGACY_USERS}{LEGACY_APPS}
             INSERT INTO users (id, key, comment, created_at)
                 VALUES (2, 'legacy-admin', 'existing user', '2024-01-01 12:00:00');
             INSERT INTO apps VALUES ('hello', '<h1>ok</h1>', '2024-01-01 12:00:00',
                 '2024-01-01 12:00:00');"
        ),
    );
    let store = open_store(&path);

    let report = store.ensure_schema(SchemaOptions::default()).expect("migrate");
    assert!(report.actions.contains(&SchemaAction::CreateAdmin {
        key_suffix: Some(1)
    }));
    assert_eq!(admin_key(&path).as_deref(), Some("legacy-admin-1"));
    assert_eq!(app_rows(&path), vec![("hello".to_string(), 1, "<h1>ok</h1>".to_string())]);

    let existing = store.user_by_id(UserId::from_raw(2).expect("nonzero")).expect("lookup");
    assert_eq!(existing.expect("user 2").key, "legacy-admin");
}

#[test]
fn legacy_admin_placeholder_skips_every_taken_suffix() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    seed(
        &path,
        &format!(
            "{LEGACY_USERS}{LEGACY_APPS}
             INSERT INTO users (id, key, created_at) VALUES (2, 'legacy-admin', 0);
             INSERT INTO users (id, key, created_at) VALUES (3, 'legacy-admin-1', 0);
             INSERT INTO apps VALUES ('hello', 'x', 0, 0);"
        ),
    );
    let store = open_store(&path);

    store.ensure_schema(SchemaOptions::default()).expect("migrate");
    assert_eq!(admin_key(&path).as_deref(), Some("legacy-admin-2"));
}

#[test]
fn exhausted_placeholder_space_rolls_back() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    seed(
        &path,
        &format!(
            "{LEGACY_USERS}{LEGACY_APPS}
             INSERT INTO users (id, key, created_at) VALUES (2, 'legacy-admin', 0);
             INSERT INTO users (id, key, created_at) VALUES (3, 'legacy-admin-1', 0);
             INSERT INTO users (id, key, created_at) VALUES (4, 'legacy-admin-2', 0);
             INSERT INTO apps VALUES ('hello', 'x', 0, 0);"
        ),
    );
    let store = open_store(&path);
    let options = SchemaOptions {
        max_key_suffix_attempts: 2,
        ..SchemaOptions::default()
    };

    let err = store.ensure_schema(options).expect_err("exhausted");
    assert_eq!(
        err,
        SqliteStoreError::AdminKeySpaceExhausted {
            attempts: 2
        }
    );
    assert!(!table_exists(&path, "apps_old"));
    assert!(!table_exists(&path, "access_logs"));
    assert_eq!(admin_key(&path), None);
    assert_eq!(
        SchemaManager::inspect(store.pool()).expect("inspect").state(),
        SchemaState::LegacyUnmigrated
    );
}

// ============================================================================
// SECTION: Legacy Partial
// ============================================================================

#[test]
fn orphaned_aside_without_current_table_is_recovered() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    seed(
        &path,
        &format!(
            "{LEGACY_USERS}{LEGACY_APPS_OLD}
             INSERT INTO users (id, key, comment, created_at)
                 VALUES (2, 'legacy-admin', 'existing user', '2024-01-01 12:00:00.5');
             INSERT INTO apps_old VALUES ('hello', '<h1>ok</h1>', '2024-01-01 12:00:00',
                 '2024-01-01 12:00:00');"
        ),
    );
    let store = open_store(&path);
    assert_eq!(
        SchemaManager::inspect(store.pool()).expect("inspect").state(),
        SchemaState::LegacyPartial {
            current_table: CurrentTable::Missing
        }
    );

    let report = store.ensure_schema(SchemaOptions::default()).expect("recover");
    assert_eq!(report.migrated_rows, 1);
    assert!(!table_exists(&path, "apps_old"));
    assert_eq!(admin_key(&path).as_deref(), Some("legacy-admin-1"));
    assert_eq!(app_rows(&path), vec![("hello".to_string(), 1, "<h1>ok</h1>".to_string())]);

    let users = store.list_users().expect("list users");
    assert_eq!(users.len(), 2);
    assert_eq!(users[1].created_at.get(), 1_704_110_400_500);
}

#[test]
fn orphaned_aside_rows_are_not_duplicated() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    seed(
        &path,
        &format!(
            "{LEGACY_USERS}{TENANT_APPS}{LEGACY_APPS_OLD}
             INSERT INTO users (id, key, created_at) VALUES (1, 'admin', 0);
             INSERT INTO apps VALUES ('hello', 1, 'already migrated', 5, 5);
             INSERT INTO apps_old VALUES ('hello', 'stale copy', 1, 1);
             INSERT INTO apps_old VALUES ('other', 'not yet migrated', 2, 3);"
        ),
    );
    let store = open_store(&path);

    let report = store.ensure_schema(SchemaOptions::default()).expect("recover");
    assert_eq!(
        report.observed,
        SchemaState::LegacyPartial {
            current_table: CurrentTable::Tenant
        }
    );
    assert_eq!(report.migrated_rows, 1);
    assert!(!report.actions.iter().any(|action| matches!(action, SchemaAction::CreateAdmin { .. })));
    assert_eq!(
        app_rows(&path),
        vec![
            ("hello".to_string(), 1, "already migrated".to_string()),
            ("other".to_string(), 1, "not yet migrated".to_string()),
        ]
    );
    assert!(!table_exists(&path, "apps_old"));
    assert!(store.ensure_schema(SchemaOptions::default()).expect("rerun").is_noop());
}

#[test]
fn single_tenant_table_next_to_aside_is_merged() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    seed(
        &path,
        &format!(
            "{LEGACY_APPS_OLD}{LEGACY_APPS}
             INSERT INTO apps_old VALUES ('hello', 'from aside', 1, 1);
             INSERT INTO apps VALUES ('second', 'from current', 2, 2);"
        ),
    );
    let store = open_store(&path);

    let report = store.ensure_schema(SchemaOptions::default()).expect("recover");
    assert_eq!(
        report.observed,
        SchemaState::LegacyPartial {
            current_table: CurrentTable::Legacy
        }
    );
    assert!(report.actions.contains(&SchemaAction::RenameTable {
        from: "apps",
        to: "apps_stale"
    }));
    assert_eq!(report.migrated_rows, 2);
    assert!(!table_exists(&path, "apps_old"));
    assert!(!table_exists(&path, "apps_stale"));
    assert_eq!(
        app_rows(&path),
        vec![
            ("hello".to_string(), 1, "from aside".to_string()),
            ("second".to_string(), 1, "from current".to_string()),
        ]
    );
}

#[test]
fn dangling_owner_in_aside_rolls_back_recovery() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    seed(
        &path,
        "CREATE TABLE apps_old (
             slug TEXT NOT NULL,
             user_id INTEGER,
             html_content TEXT,
             created_at INTEGER,
             updated_at INTEGER
         );
         INSERT INTO apps_old VALUES ('orphan', 99, 'x', 1, 1);",
    );
    let store = open_store(&path);

    let err = store.ensure_schema(SchemaOptions::default()).expect_err("dangling owner");
    assert!(matches!(err, SqliteStoreError::Schema(_)));
    assert!(table_exists(&path, "apps_old"));
    assert!(!table_exists(&path, "apps"));
    assert!(!table_exists(&path, "users"));
}

// ============================================================================
// SECTION: Admin Key Reconciliation
// ============================================================================

#[test]
fn reconcile_creates_updates_and_skips() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    let store = open_store(&path);
    store.ensure_schema(SchemaOptions::default()).expect("schema");

    assert_eq!(store.reconcile_admin_key("").expect("skip"), AdminReconcileOutcome::Skipped);
    assert_eq!(admin_key(&path), None);
    assert_eq!(store.reconcile_admin_key("first").expect("create"), AdminReconcileOutcome::Created);
    assert_eq!(
        store.reconcile_admin_key("first").expect("unchanged"),
        AdminReconcileOutcome::Unchanged
    );
    assert_eq!(
        store.reconcile_admin_key("rotated").expect("update"),
        AdminReconcileOutcome::Updated
    );
    assert_eq!(admin_key(&path).as_deref(), Some("rotated"));
    assert_eq!(store.reconcile_admin_key("").expect("skip"), AdminReconcileOutcome::Skipped);
    assert_eq!(admin_key(&path).as_deref(), Some("rotated"));
}

#[test]
fn reconcile_rejects_key_held_by_another_user() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    let store = open_store(&path);
    store.ensure_schema(SchemaOptions::default()).expect("schema");
    store.reconcile_admin_key("admin-secret").expect("create admin");
    store.create_user("tenant-key", None).expect("create tenant");

    let err = store.reconcile_admin_key("tenant-key").expect_err("collision");
    assert_eq!(err, SqliteStoreError::KeyAlreadyExists);
    assert_eq!(admin_key(&path).as_deref(), Some("admin-secret"));
}

#[test]
fn migrated_store_accepts_tenant_writes() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("apps.db");
    seed(&path, &format!("{LEGACY_APPS} INSERT INTO apps VALUES ('hello', 'x', 0, 0);"));
    let store = open_store(&path);
    store.ensure_schema(SchemaOptions::default()).expect("migrate");
    store.reconcile_admin_key("configured").expect("reconcile");

    let tenant = store.create_user("tenant", Some("first tenant")).expect("tenant");
    store.upsert_app(&AppSlug::new("hello"), tenant, "mine").expect("upsert");
    assert_eq!(
        app_rows(&path),
        vec![
            ("hello".to_string(), 1, "x".to_string()),
            ("hello".to_string(), 2, "mine".to_string()),
        ]
    );
}
