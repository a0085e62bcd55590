// crates/miniapp-store-sqlite/src/schema.rs
// ============================================================================
// Module: SQLite Schema Manager
// Description: Schema introspection, convergence, and admin key reconciliation.
// Purpose: Bring any observed store layout to the tenant-aware schema safely.
// Dependencies: miniapp-core, rusqlite, serde
// ============================================================================

//! ## Overview
//! The manager classifies the store by reading `sqlite_master` and
//! `pragma_table_info`, then converges it inside one immediate transaction:
//!
//! - `Fresh`: create every table.
//! - `LegacyUnmigrated`: ensure the admin, set the single-tenant `apps` table
//!   aside as `apps_old`, create the tenant table, copy rows to `user_id = 1`,
//!   drop the aside table.
//! - `LegacyPartial`: an aside table survived an interrupted run. Rows are
//!   copied with insert-if-absent semantics so a rerun never duplicates.
//! - `Current`: create only what is missing (access log, indexes).
//!
//! In every state, timestamps still stored as text or `NULL` are rewritten as
//! unix milliseconds so ordering and `MAX` comparisons stay numeric. A store
//! with integer timestamps throughout sees no write.
//!
//! Foreign key enforcement is switched off on the migrating connection before
//! the transaction begins and restored after it ends; `SQLite` ignores the
//! pragma inside a transaction. `PRAGMA foreign_key_check` must report no
//! violations before commit. Any failure rolls back and surfaces as
//! [`SqliteStoreError::Schema`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::TransactionBehavior;
use rusqlite::named_params;
use rusqlite::params;
use serde::Serialize;

use crate::error::ConstraintKind;
use crate::error::SqliteStoreError;
use crate::error::constraint_kind;
use crate::error::db_error;
use crate::pool::SqlitePool;
use crate::pool::run_in_transaction;
use crate::timestamp::unix_millis;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Identity table.
pub const USERS_TABLE: &str = "users";
/// App table.
pub const APPS_TABLE: &str = "apps";
/// Access log table.
pub const ACCESS_LOGS_TABLE: &str = "access_logs";
/// Aside name for a single-tenant app table being migrated.
pub const LEGACY_ASIDE_TABLE: &str = "apps_old";
/// Aside name for a single-tenant app table found next to `apps_old`.
pub const STALE_ASIDE_TABLE: &str = "apps_stale";
/// App listing index.
pub const APPS_INDEX: &str = "idx_apps_user_updated";
/// Access log aggregation index.
pub const ACCESS_LOG_INDEX: &str = "idx_access_logs_user_action";
/// Placeholder key given to an admin created during migration.
pub const LEGACY_ADMIN_KEY: &str = "legacy-admin";
/// Default bound on suffixed placeholder candidates.
pub const DEFAULT_MAX_KEY_SUFFIX_ATTEMPTS: u32 = 100;
/// Comment stored on a migration-created admin.
const LEGACY_ADMIN_COMMENT: &str = "Legacy admin";
/// Comment stored on a reconciliation-created admin.
const ADMIN_COMMENT: &str = "Admin";

/// Identity table definition.
const CREATE_USERS_TABLE: &str = "CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    comment TEXT,
    created_at INTEGER NOT NULL
);";
/// Tenant-aware app table definition.
const CREATE_APPS_TABLE: &str = "CREATE TABLE apps (
    slug TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    html_content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (slug, user_id)
);";
/// Access log table definition.
const CREATE_ACCESS_LOGS_TABLE: &str = "CREATE TABLE access_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    action TEXT NOT NULL,
    slug TEXT,
    timestamp INTEGER NOT NULL
);";
/// App listing index definition.
const CREATE_APPS_INDEX: &str =
    "CREATE INDEX idx_apps_user_updated ON apps (user_id, updated_at DESC);";
/// Access log index definition.
const CREATE_ACCESS_LOG_INDEX: &str =
    "CREATE INDEX idx_access_logs_user_action ON access_logs (user_id, action);";

// ============================================================================
// SECTION: Schema State
// ============================================================================

/// Shape of the table currently named `apps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentTable {
    /// No `apps` table.
    Missing,
    /// Single-tenant table without `user_id`.
    Legacy,
    /// Tenant-aware table.
    Tenant,
}

/// Observed store condition driving convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchemaState {
    /// No app table exists.
    Fresh,
    /// A single-tenant app table exists and nothing is set aside.
    LegacyUnmigrated,
    /// An aside table from an interrupted migration is present.
    LegacyPartial {
        /// Shape of the table named `apps`.
        current_table: CurrentTable,
    },
    /// The app table is tenant-aware and nothing is set aside.
    Current,
}

impl SchemaState {
    /// Returns a stable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::LegacyUnmigrated => "legacy_unmigrated",
            Self::LegacyPartial {
                ..
            } => "legacy_partial",
            Self::Current => "current",
        }
    }

    /// Returns true when convergence must copy legacy rows.
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(
            self,
            Self::LegacyUnmigrated
                | Self::LegacyPartial {
                    ..
                }
        )
    }
}

/// Table and index presence read from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools, reason = "Mirrors catalog presence flags one-to-one.")]
pub struct SchemaSnapshot {
    /// Shape of the `apps` table.
    pub apps: CurrentTable,
    /// `users` exists.
    pub users: bool,
    /// `access_logs` exists.
    pub access_logs: bool,
    /// `apps_old` exists.
    pub legacy_aside: bool,
    /// `apps_stale` exists.
    pub stale_aside: bool,
}

impl SchemaSnapshot {
    /// Classifies the snapshot.
    #[must_use]
    pub const fn state(&self) -> SchemaState {
        if self.legacy_aside || self.stale_aside {
            return SchemaState::LegacyPartial {
                current_table: self.apps,
            };
        }
        match self.apps {
            CurrentTable::Missing => SchemaState::Fresh,
            CurrentTable::Legacy => SchemaState::LegacyUnmigrated,
            CurrentTable::Tenant => SchemaState::Current,
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// A single write performed during convergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SchemaAction {
    /// Created a table.
    CreateTable {
        /// Table name.
        table: &'static str,
    },
    /// Created an index.
    CreateIndex {
        /// Index name.
        index: &'static str,
    },
    /// Created the admin identity with a placeholder key.
    CreateAdmin {
        /// Numeric suffix appended to the placeholder, if any.
        key_suffix: Option<u32>,
    },
    /// Renamed a table aside.
    RenameTable {
        /// Previous name.
        from: &'static str,
        /// New name.
        to: &'static str,
    },
    /// Copied rows between tables.
    CopyRows {
        /// Source table.
        from: &'static str,
        /// Destination table.
        to: &'static str,
        /// Rows inserted.
        rows: usize,
    },
    /// Dropped a table.
    DropTable {
        /// Table name.
        table: &'static str,
    },
    /// Rewrote non-integer timestamps as unix millis.
    NormalizeTimestamps {
        /// Table name.
        table: &'static str,
        /// Rows rewritten.
        rows: usize,
    },
}

/// Outcome of one convergence run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    /// State observed before convergence.
    pub observed: SchemaState,
    /// Writes performed in order.
    pub actions: Vec<SchemaAction>,
    /// App rows copied out of aside tables.
    pub migrated_rows: usize,
}

impl SchemaReport {
    /// Creates an empty report for an observed state.
    const fn new(observed: SchemaState) -> Self {
        Self {
            observed,
            actions: Vec::new(),
            migrated_rows: 0,
        }
    }

    /// Returns true when no writes were performed.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Outcome of admin key reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminReconcileOutcome {
    /// Supplied key was empty; nothing done.
    Skipped,
    /// Admin created with the supplied key.
    Created,
    /// Admin key overwritten.
    Updated,
    /// Admin already held the supplied key.
    Unchanged,
}

// ============================================================================
// SECTION: Schema Manager
// ============================================================================

/// Tuning for legacy migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Placeholder key for a migration-created admin.
    pub legacy_admin_key: String,
    /// Suffixed candidates tried after the placeholder collides.
    pub max_key_suffix_attempts: u32,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            legacy_admin_key: LEGACY_ADMIN_KEY.to_string(),
            max_key_suffix_attempts: DEFAULT_MAX_KEY_SUFFIX_ATTEMPTS,
        }
    }
}

/// Converges the store schema and reconciles the admin identity.
#[derive(Debug, Clone, Default)]
pub struct SchemaManager {
    /// Migration options.
    options: SchemaOptions,
}

impl SchemaManager {
    /// Creates a manager with explicit options.
    #[must_use]
    pub const fn new(options: SchemaOptions) -> Self {
        Self {
            options,
        }
    }

    /// Reads the current catalog without writing.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the catalog cannot be read.
    pub fn inspect(pool: &SqlitePool) -> Result<SchemaSnapshot, SqliteStoreError> {
        pool.with_connection(inspect_connection)
    }

    /// Brings the schema to the tenant-aware layout.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Schema`] or
    /// [`SqliteStoreError::AdminKeySpaceExhausted`] when convergence fails; the
    /// store is left exactly as it was.
    pub fn ensure_schema(&self, pool: &SqlitePool) -> Result<SchemaReport, SqliteStoreError> {
        let mut connection = pool.connection()?;
        with_foreign_keys_disabled(&mut connection, |connection| {
            run_in_transaction(connection, TransactionBehavior::Immediate, |tx| self.converge(tx))
        })
        .map_err(schema_failure)
    }

    /// Synchronizes the admin key with the supplied secret.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::KeyAlreadyExists`] when another user holds
    /// `key`.
    pub fn reconcile_admin_key(
        pool: &SqlitePool,
        key: &str,
    ) -> Result<AdminReconcileOutcome, SqliteStoreError> {
        if key.is_empty() {
            return Ok(AdminReconcileOutcome::Skipped);
        }
        pool.with_transaction(|tx| {
            let current: Option<String> = tx
                .query_row("SELECT key FROM users WHERE id = 1", params![], |row| row.get(0))
                .optional()
                .map_err(db_error)?;
            match current {
                None => {
                    tx.execute(
                        "INSERT INTO users (id, key, comment, created_at) VALUES (1, ?1, ?2, ?3)",
                        params![key, ADMIN_COMMENT, unix_millis()],
                    )
                    .map_err(key_write_error)?;
                    Ok(AdminReconcileOutcome::Created)
                }
                Some(existing) if existing == key => Ok(AdminReconcileOutcome::Unchanged),
                Some(_) => {
                    tx.execute("UPDATE users SET key = ?1 WHERE id = 1", params![key])
                        .map_err(key_write_error)?;
                    Ok(AdminReconcileOutcome::Updated)
                }
            }
        })
    }

    /// Runs every convergence step inside `tx`.
    fn converge(&self, tx: &Transaction<'_>) -> Result<SchemaReport, SqliteStoreError> {
        let snapshot = inspect_connection(tx)?;
        let observed = snapshot.state();
        let mut report = SchemaReport::new(observed);
        let now = unix_millis();

        if !snapshot.users {
            create_table(tx, USERS_TABLE, CREATE_USERS_TABLE, &mut report)?;
        }
        match observed {
            SchemaState::Fresh => create_table(tx, APPS_TABLE, CREATE_APPS_TABLE, &mut report)?,
            SchemaState::Current => {}
            SchemaState::LegacyUnmigrated => {
                self.ensure_admin(tx, now, &mut report)?;
                rename_table(tx, APPS_TABLE, LEGACY_ASIDE_TABLE, &mut report)?;
                create_table(tx, APPS_TABLE, CREATE_APPS_TABLE, &mut report)?;
                drain_aside(tx, LEGACY_ASIDE_TABLE, now, &mut report)?;
            }
            SchemaState::LegacyPartial {
                current_table,
            } => {
                self.ensure_admin(tx, now, &mut report)?;
                match current_table {
                    CurrentTable::Missing => {
                        create_table(tx, APPS_TABLE, CREATE_APPS_TABLE, &mut report)?;
                    }
                    CurrentTable::Legacy => {
                        set_aside_stale(tx, &mut report)?;
                        create_table(tx, APPS_TABLE, CREATE_APPS_TABLE, &mut report)?;
                    }
                    CurrentTable::Tenant => {}
                }
                for aside in [LEGACY_ASIDE_TABLE, STALE_ASIDE_TABLE] {
                    if object_exists(tx, "table", aside)? {
                        drain_aside(tx, aside, now, &mut report)?;
                    }
                }
            }
        }

        if !object_exists(tx, "table", ACCESS_LOGS_TABLE)? {
            create_table(tx, ACCESS_LOGS_TABLE, CREATE_ACCESS_LOGS_TABLE, &mut report)?;
        }
        normalize_timestamps(tx, now, &mut report)?;
        create_index_if_missing(tx, APPS_INDEX, CREATE_APPS_INDEX, &mut report)?;
        create_index_if_missing(tx, ACCESS_LOG_INDEX, CREATE_ACCESS_LOG_INDEX, &mut report)?;

        if observed.is_legacy() {
            ensure_foreign_keys_hold(tx)?;
        }
        Ok(report)
    }

    /// Creates the admin with a free placeholder key when `id = 1` is absent.
    fn ensure_admin(
        &self,
        tx: &Transaction<'_>,
        now: i64,
        report: &mut SchemaReport,
    ) -> Result<(), SqliteStoreError> {
        let admin_exists: bool = tx
            .query_row("SELECT EXISTS(SELECT 1 FROM users WHERE id = 1)", params![], |row| {
                row.get(0)
            })
            .map_err(db_error)?;
        if admin_exists {
            return Ok(());
        }
        let base = &self.options.legacy_admin_key;
        for suffix in 0 ..= self.options.max_key_suffix_attempts {
            let candidate =
                if suffix == 0 { base.clone() } else { format!("{base}-{suffix}") };
            let taken: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE key = ?1)",
                    params![candidate],
                    |row| row.get(0),
                )
                .map_err(db_error)?;
            if taken {
                continue;
            }
            tx.execute(
                "INSERT INTO users (id, key, comment, created_at) VALUES (1, ?1, ?2, ?3)",
                params![candidate, LEGACY_ADMIN_COMMENT, now],
            )
            .map_err(db_error)?;
            report.actions.push(SchemaAction::CreateAdmin {
                key_suffix: (suffix > 0).then_some(suffix),
            });
            return Ok(());
        }
        Err(SqliteStoreError::AdminKeySpaceExhausted {
            attempts: self.options.max_key_suffix_attempts,
        })
    }
}

// ============================================================================
// SECTION: Introspection
// ============================================================================

/// Reads table presence and app table shape.
fn inspect_connection(connection: &Connection) -> Result<SchemaSnapshot, SqliteStoreError> {
    let apps = if !object_exists(connection, "table", APPS_TABLE)? {
        CurrentTable::Missing
    } else if has_column(connection, APPS_TABLE, "user_id")? {
        CurrentTable::Tenant
    } else {
        CurrentTable::Legacy
    };
    Ok(SchemaSnapshot {
        apps,
        users: object_exists(connection, "table", USERS_TABLE)?,
        access_logs: object_exists(connection, "table", ACCESS_LOGS_TABLE)?,
        legacy_aside: object_exists(connection, "table", LEGACY_ASIDE_TABLE)?,
        stale_aside: object_exists(connection, "table", STALE_ASIDE_TABLE)?,
    })
}

/// Returns true when a catalog object of `kind` named `name` exists.
fn object_exists(connection: &Connection, kind: &str, name: &str) -> Result<bool, SqliteStoreError> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2)",
            params![kind, name],
            |row| row.get(0),
        )
        .map_err(db_error)
}

/// Returns true when `table` has a column named `column`.
fn has_column(connection: &Connection, table: &str, column: &str) -> Result<bool, SqliteStoreError> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2)",
            params![table, column],
            |row| row.get(0),
        )
        .map_err(db_error)
}

// ============================================================================
// SECTION: Convergence Steps
// ============================================================================

/// Creates a table and records the action.
fn create_table(
    tx: &Transaction<'_>,
    table: &'static str,
    ddl: &str,
    report: &mut SchemaReport,
) -> Result<(), SqliteStoreError> {
    tx.execute_batch(ddl).map_err(db_error)?;
    report.actions.push(SchemaAction::CreateTable {
        table,
    });
    Ok(())
}

/// Creates an index unless it already exists.
fn create_index_if_missing(
    tx: &Transaction<'_>,
    index: &'static str,
    ddl: &str,
    report: &mut SchemaReport,
) -> Result<(), SqliteStoreError> {
    if object_exists(tx, "index", index)? {
        return Ok(());
    }
    tx.execute_batch(ddl).map_err(db_error)?;
    report.actions.push(SchemaAction::CreateIndex {
        index,
    });
    Ok(())
}

/// Renames a table and records the action.
fn rename_table(
    tx: &Transaction<'_>,
    from: &'static str,
    to: &'static str,
    report: &mut SchemaReport,
) -> Result<(), SqliteStoreError> {
    tx.execute_batch(&format!("ALTER TABLE {from} RENAME TO {to};")).map_err(db_error)?;
    report.actions.push(SchemaAction::RenameTable {
        from,
        to,
    });
    Ok(())
}

/// Drops a table and records the action.
fn drop_table(
    tx: &Transaction<'_>,
    table: &'static str,
    report: &mut SchemaReport,
) -> Result<(), SqliteStoreError> {
    tx.execute_batch(&format!("DROP TABLE {table};")).map_err(db_error)?;
    report.actions.push(SchemaAction::DropTable {
        table,
    });
    Ok(())
}

/// Moves a single-tenant `apps` table out of the way next to `apps_old`.
fn set_aside_stale(tx: &Transaction<'_>, report: &mut SchemaReport) -> Result<(), SqliteStoreError> {
    if !object_exists(tx, "table", STALE_ASIDE_TABLE)? {
        return rename_table(tx, APPS_TABLE, STALE_ASIDE_TABLE, report);
    }
    let rows = tx
        .execute(
            "INSERT OR IGNORE INTO apps_stale (slug, html_content, created_at, updated_at)
             SELECT slug, html_content, created_at, updated_at FROM apps",
            params![],
        )
        .map_err(db_error)?;
    report.actions.push(SchemaAction::CopyRows {
        from: APPS_TABLE,
        to: STALE_ASIDE_TABLE,
        rows,
    });
    drop_table(tx, APPS_TABLE, report)
}

/// Copies aside rows into `apps` if absent, then drops the aside table.
fn drain_aside(
    tx: &Transaction<'_>,
    aside: &'static str,
    now: i64,
    report: &mut SchemaReport,
) -> Result<(), SqliteStoreError> {
    let owner =
        if has_column(tx, aside, "user_id")? { "COALESCE(user_id, 1)" } else { "1" };
    let created = legacy_millis_expr("created_at");
    let updated = legacy_millis_expr("updated_at");
    let sql = format!(
        "INSERT OR IGNORE INTO apps (slug, user_id, html_content, created_at, updated_at)
         SELECT slug, {owner}, COALESCE(html_content, ''), {created}, MAX({created}, {updated})
         FROM {aside} WHERE slug IS NOT NULL"
    );
    let rows = tx.execute(&sql, named_params! {":now": now}).map_err(db_error)?;
    report.migrated_rows = report.migrated_rows.saturating_add(rows);
    report.actions.push(SchemaAction::CopyRows {
        from: aside,
        to: APPS_TABLE,
        rows,
    });
    drop_table(tx, aside, report)
}

/// Rewrites text or `NULL` timestamps in every table as unix millis.
fn normalize_timestamps(
    tx: &Transaction<'_>,
    now: i64,
    report: &mut SchemaReport,
) -> Result<(), SqliteStoreError> {
    let created = legacy_millis_expr("created_at");
    let updated = legacy_millis_expr("updated_at");
    let stamp = legacy_millis_expr("timestamp");
    let statements = [
        (
            APPS_TABLE,
            format!(
                "UPDATE apps SET created_at = {created}, updated_at = MAX({created}, {updated})
                 WHERE typeof(created_at) != 'integer' OR typeof(updated_at) != 'integer'"
            ),
        ),
        (
            USERS_TABLE,
            format!(
                "UPDATE users SET created_at = {created} WHERE typeof(created_at) != 'integer'"
            ),
        ),
        (
            ACCESS_LOGS_TABLE,
            format!(
                "UPDATE access_logs SET timestamp = {stamp} WHERE typeof(timestamp) != 'integer'"
            ),
        ),
    ];
    for (table, sql) in statements {
        let rows = tx.execute(&sql, named_params! {":now": now}).map_err(db_error)?;
        if rows > 0 {
            report.actions.push(SchemaAction::NormalizeTimestamps {
                table,
                rows,
            });
        }
    }
    Ok(())
}

/// SQL converting a legacy timestamp column to unix millis, `:now` if unusable.
fn legacy_millis_expr(column: &str) -> String {
    format!(
        "(CASE typeof({column}) \
         WHEN 'integer' THEN {column} \
         WHEN 'text' THEN COALESCE(CAST(ROUND((julianday({column}) - 2440587.5) * 86400000.0) \
         AS INTEGER), :now) \
         ELSE :now END)"
    )
}

/// Fails when any foreign key reference is dangling.
fn ensure_foreign_keys_hold(tx: &Transaction<'_>) -> Result<(), SqliteStoreError> {
    let mut statement = tx.prepare("PRAGMA foreign_key_check").map_err(db_error)?;
    let mut rows = statement.query(params![]).map_err(db_error)?;
    if rows.next().map_err(db_error)?.is_some() {
        return Err(SqliteStoreError::Schema(
            "foreign key violations remain after migration".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs `work` with foreign key enforcement off, restoring it on every path.
fn with_foreign_keys_disabled<T>(
    connection: &mut Connection,
    work: impl FnOnce(&mut Connection) -> Result<T, SqliteStoreError>,
) -> Result<T, SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = OFF;").map_err(db_error)?;
    let outcome = work(connection);
    let restored = connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error);
    let value = outcome?;
    restored?;
    Ok(value)
}

/// Wraps convergence failures as fatal schema errors.
fn schema_failure(error: SqliteStoreError) -> SqliteStoreError {
    match error {
        SqliteStoreError::Schema(_) | SqliteStoreError::AdminKeySpaceExhausted {
            ..
        } => error,
        other => SqliteStoreError::Schema(format!("schema convergence failed: {other}")),
    }
}

/// Maps key write failures, classifying uniqueness collisions.
pub(crate) fn key_write_error(error: rusqlite::Error) -> SqliteStoreError {
    match constraint_kind(&error) {
        Some(ConstraintKind::Unique) => SqliteStoreError::KeyAlreadyExists,
        _ => db_error(error),
    }
}
