// crates/miniapp-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Miniapp Store
// Description: Identity, app, and access log storage backed by SQLite.
// Purpose: Implement the core store traits with tenant-scoped SQL.
// Dependencies: miniapp-core, rusqlite
// ============================================================================

//! ## Overview
//! [`SqliteMiniAppStore`] implements [`IdentityStore`], [`AppStore`], and
//! [`AccessLog`] over a [`SqlitePool`]. Every app statement binds both the
//! slug and the owner, so no query can cross tenants. Each mutation runs in
//! its own immediate transaction.
//!
//! Identifier `1` is reserved for the admin: ordinary user creation never
//! assigns it, even on an empty identity table.
//!
//! Security posture: database contents are untrusted; rows that cannot be
//! decoded fail closed with [`SqliteStoreError::Invalid`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use miniapp_core::AccessAction;
use miniapp_core::AccessLog;
use miniapp_core::AccessLogEntry;
use miniapp_core::App;
use miniapp_core::AppScope;
use miniapp_core::AppSlug;
use miniapp_core::AppStore;
use miniapp_core::AppSummary;
use miniapp_core::IdentityStore;
use miniapp_core::StoreError;
use miniapp_core::UnixMillis;
use miniapp_core::UsageStats;
use miniapp_core::User;
use miniapp_core::UserId;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;

use crate::error::ConstraintKind;
use crate::error::SqliteStoreError;
use crate::error::constraint_kind;
use crate::error::db_error;
use crate::pool::SqlitePool;
use crate::pool::SqliteStoreConfig;
use crate::schema::AdminReconcileOutcome;
use crate::schema::SchemaManager;
use crate::schema::SchemaOptions;
use crate::schema::SchemaReport;
use crate::schema::key_write_error;
use crate::timestamp::timestamp_column;
use crate::timestamp::unix_millis;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Smallest identifier handed to ordinary users.
const FIRST_TENANT_ID: i64 = 2;

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed miniapp store.
#[derive(Clone)]
pub struct SqliteMiniAppStore {
    /// Connection pool.
    pool: SqlitePool,
}

impl SqliteMiniAppStore {
    /// Opens the store. The schema is not touched until
    /// [`SqliteMiniAppStore::ensure_schema`] runs.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the pool cannot be opened.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        Ok(Self {
            pool: SqlitePool::open(config)?,
        })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
        }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Converges the schema; see [`SchemaManager::ensure_schema`].
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Schema`] when convergence fails.
    pub fn ensure_schema(&self, options: SchemaOptions) -> Result<SchemaReport, SqliteStoreError> {
        SchemaManager::new(options).ensure_schema(&self.pool)
    }

    /// Synchronizes the admin key; see [`SchemaManager::reconcile_admin_key`].
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::KeyAlreadyExists`] when another user holds
    /// `key`.
    pub fn reconcile_admin_key(&self, key: &str) -> Result<AdminReconcileOutcome, SqliteStoreError> {
        SchemaManager::reconcile_admin_key(&self.pool, key)
    }

    /// Returns the number of identities.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn count_identities(&self) -> Result<u64, SqliteStoreError> {
        self.pool.with_connection(|connection| {
            let count: i64 = connection
                .query_row("SELECT COUNT(*) FROM users", params![], |row| row.get(0))
                .map_err(db_error)?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    /// Returns the most recent access log entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails or a row is invalid.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<AccessLogEntry>, SqliteStoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.pool.with_connection(|connection| {
            let mut statement = connection
                .prepare(
                    "SELECT id, user_id, action, slug, timestamp FROM access_logs
                     ORDER BY id DESC LIMIT ?1",
                )
                .map_err(db_error)?;
            let rows = statement
                .query_map(params![limit], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        timestamp_column(row, 4)?,
                    ))
                })
                .map_err(db_error)?;
            let mut entries = Vec::new();
            for row in rows {
                let (id, user_id, action, slug, timestamp) = row.map_err(db_error)?;
                let action = AccessAction::parse(&action).ok_or_else(|| {
                    SqliteStoreError::Invalid(format!("unknown access action: {action}"))
                })?;
                entries.push(AccessLogEntry {
                    id,
                    user_id: user_id.and_then(UserId::from_i64),
                    action,
                    slug: slug.map(AppSlug::new),
                    timestamp,
                });
            }
            Ok(entries)
        })
    }

    /// Inserts a user with the next identifier above the reserved admin id.
    fn insert_user(&self, key: &str, comment: Option<&str>) -> Result<UserId, SqliteStoreError> {
        self.pool.with_transaction(|tx| {
            let max_id: i64 = tx
                .query_row("SELECT COALESCE(MAX(id), 0) FROM users", params![], |row| row.get(0))
                .map_err(db_error)?;
            let next_id = max_id.saturating_add(1).max(FIRST_TENANT_ID);
            tx.execute(
                "INSERT INTO users (id, key, comment, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![next_id, key, comment, unix_millis()],
            )
            .map_err(key_write_error)?;
            user_id_column(next_id)
        })
    }

    /// Upserts one app row.
    fn write_app(&self, slug: &AppSlug, owner: UserId, html: &str) -> Result<(), SqliteStoreError> {
        self.pool.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO apps (slug, user_id, html_content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT (slug, user_id) DO UPDATE SET
                     html_content = excluded.html_content,
                     updated_at = MAX(apps.updated_at, excluded.updated_at)",
                params![slug.as_str(), owner.as_i64(), html, unix_millis()],
            )
            .map_err(|err| match constraint_kind(&err) {
                Some(ConstraintKind::ForeignKey) => SqliteStoreError::UnknownOwner(owner),
                _ => db_error(err),
            })?;
            Ok(())
        })
    }

    /// Aggregates log counts and live app counts from one snapshot.
    fn compute_stats(&self) -> Result<UsageStats, SqliteStoreError> {
        self.pool.with_read_transaction(|tx| {
            let mut stats = UsageStats::new();
            let mut statement = tx
                .prepare(
                    "SELECT user_id, action, COUNT(*) FROM access_logs
                     WHERE user_id IS NOT NULL GROUP BY user_id, action",
                )
                .map_err(db_error)?;
            let rows = statement
                .query_map(params![], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
                })
                .map_err(db_error)?;
            for row in rows {
                let (user_id, action, count) = row.map_err(db_error)?;
                let (Some(user_id), Some(action)) =
                    (UserId::from_i64(user_id), AccessAction::parse(&action))
                else {
                    continue;
                };
                stats.add_action(user_id, action, u64::try_from(count).unwrap_or(0));
            }

            let mut statement = tx
                .prepare("SELECT user_id, COUNT(*) FROM apps GROUP BY user_id")
                .map_err(db_error)?;
            let rows = statement
                .query_map(params![], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
                .map_err(db_error)?;
            for row in rows {
                let (user_id, count) = row.map_err(db_error)?;
                let user_id = user_id_column(user_id)?;
                stats.set_apps_count(user_id, u64::try_from(count).unwrap_or(0));
            }
            Ok(stats)
        })
    }
}

// ============================================================================
// SECTION: Identity Store
// ============================================================================

impl IdentityStore for SqliteMiniAppStore {
    fn user_by_key(&self, key: &str) -> Result<Option<User>, StoreError> {
        self.pool
            .with_connection(|connection| {
                query_user(
                    connection,
                    "SELECT id, key, comment, created_at FROM users WHERE key = ?1",
                    key,
                )
            })
            .map_err(StoreError::from)
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.pool
            .with_connection(|connection| {
                query_user(
                    connection,
                    "SELECT id, key, comment, created_at FROM users WHERE id = ?1",
                    id.as_i64(),
                )
            })
            .map_err(StoreError::from)
    }

    fn create_user(&self, key: &str, comment: Option<&str>) -> Result<UserId, StoreError> {
        self.insert_user(key, comment).map_err(StoreError::from)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.pool
            .with_connection(|connection| {
                let mut statement = connection
                    .prepare("SELECT id, key, comment, created_at FROM users ORDER BY id ASC")
                    .map_err(db_error)?;
                let rows = statement.query_map(params![], user_row).map_err(db_error)?;
                let mut users = Vec::new();
                for row in rows {
                    users.push(decode_user(row.map_err(db_error)?)?);
                }
                Ok(users)
            })
            .map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: App Store
// ============================================================================

impl AppStore for SqliteMiniAppStore {
    fn upsert_app(&self, slug: &AppSlug, owner: UserId, html: &str) -> Result<(), StoreError> {
        self.write_app(slug, owner, html).map_err(StoreError::from)
    }

    fn fetch_app(&self, slug: &AppSlug, owner: UserId) -> Result<Option<App>, StoreError> {
        self.pool
            .with_connection(|connection| {
                let row = connection
                    .query_row(
                        "SELECT html_content, created_at, updated_at FROM apps
                         WHERE slug = ?1 AND user_id = ?2",
                        params![slug.as_str(), owner.as_i64()],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                timestamp_column(row, 1)?,
                                timestamp_column(row, 2)?,
                            ))
                        },
                    )
                    .optional()
                    .map_err(db_error)?;
                Ok(row.map(|(html_content, created_at, updated_at)| App {
                    slug: slug.clone(),
                    user_id: owner,
                    html_content,
                    created_at,
                    updated_at,
                }))
            })
            .map_err(StoreError::from)
    }

    fn list_apps(&self, scope: AppScope) -> Result<Vec<AppSummary>, StoreError> {
        self.pool
            .with_connection(|connection| {
                let (sql, owner) = match scope {
                    AppScope::All => (
                        "SELECT slug, user_id, updated_at FROM apps
                         ORDER BY updated_at DESC, user_id ASC, slug ASC",
                        None,
                    ),
                    AppScope::Owner(owner) => (
                        "SELECT slug, user_id, updated_at FROM apps WHERE user_id = ?1
                         ORDER BY updated_at DESC, slug ASC",
                        Some(owner.as_i64()),
                    ),
                };
                let mut statement = connection.prepare(sql).map_err(db_error)?;
                let map_row = |row: &Row<'_>| -> rusqlite::Result<(String, i64, UnixMillis)> {
                    Ok((row.get(0)?, row.get(1)?, timestamp_column(row, 2)?))
                };
                let rows = match owner {
                    Some(owner) => statement.query_map(params![owner], map_row),
                    None => statement.query_map(params![], map_row),
                }
                .map_err(db_error)?;
                let mut summaries = Vec::new();
                for row in rows {
                    let (slug, user_id, updated_at) = row.map_err(db_error)?;
                    summaries.push(AppSummary {
                        slug: AppSlug::new(slug),
                        user_id: user_id_column(user_id)?,
                        updated_at,
                    });
                }
                Ok(summaries)
            })
            .map_err(StoreError::from)
    }

    fn delete_app(&self, slug: &AppSlug, owner: UserId) -> Result<bool, StoreError> {
        self.pool
            .with_transaction(|tx| {
                let removed = tx
                    .execute(
                        "DELETE FROM apps WHERE slug = ?1 AND user_id = ?2",
                        params![slug.as_str(), owner.as_i64()],
                    )
                    .map_err(db_error)?;
                Ok(removed > 0)
            })
            .map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Access Log
// ============================================================================

impl AccessLog for SqliteMiniAppStore {
    fn record_event(
        &self,
        owner: Option<UserId>,
        action: AccessAction,
        slug: Option<&AppSlug>,
    ) -> Result<(), StoreError> {
        self.pool
            .with_transaction(|tx| {
                tx.execute(
                    "INSERT INTO access_logs (user_id, action, slug, timestamp)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        owner.map(UserId::as_i64),
                        action.as_str(),
                        slug.map(AppSlug::as_str),
                        unix_millis()
                    ],
                )
                .map_err(db_error)?;
                Ok(())
            })
            .map_err(StoreError::from)
    }

    fn aggregate_stats(&self) -> Result<UsageStats, StoreError> {
        self.compute_stats().map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Raw user columns.
type UserRow = (i64, String, Option<String>, UnixMillis);

/// Reads raw user columns.
fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, timestamp_column(row, 3)?))
}

/// Converts raw user columns.
fn decode_user((id, key, comment, created_at): UserRow) -> Result<User, SqliteStoreError> {
    Ok(User {
        id: user_id_column(id)?,
        key,
        comment,
        created_at,
    })
}

/// Runs a single-user query bound to one parameter.
fn query_user(
    connection: &Connection,
    sql: &str,
    param: impl rusqlite::ToSql,
) -> Result<Option<User>, SqliteStoreError> {
    let row = connection.query_row(sql, params![param], user_row).optional().map_err(db_error)?;
    row.map(decode_user).transpose()
}

/// Validates a stored user identifier.
fn user_id_column(raw: i64) -> Result<UserId, SqliteStoreError> {
    UserId::from_i64(raw)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("invalid stored user id: {raw}")))
}
