// crates/miniapp-store-sqlite/src/pool.rs
// ============================================================================
// Module: SQLite Connection Pool
// Description: Pooled SQLite connections with durability pragmas.
// Purpose: Hand out healthy connections and scoped transactions.
// Dependencies: r2d2, r2d2_sqlite, rusqlite, serde
// ============================================================================

//! ## Overview
//! [`SqlitePool`] owns a bounded r2d2 pool over one database file. Every
//! connection gets foreign keys, the configured journal and sync modes, and a
//! busy timeout before first use. Connections are liveness-tested on
//! checkout so a broken handle is replaced instead of returned.
//!
//! Work runs through [`SqlitePool::with_transaction`] (write lock taken up
//! front) or [`SqlitePool::with_read_transaction`] (consistent snapshot).
//! A transaction closure that returns an error rolls back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use r2d2::Pool;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::Transaction;
use rusqlite::TransactionBehavior;
use serde::Deserialize;
use serde::Serialize;

use crate::error::SqliteStoreError;
use crate::error::db_error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default pool size.
pub const DEFAULT_POOL_SIZE: u32 = 4;
/// Maximum pool size.
pub const MAX_POOL_SIZE: u32 = 64;
/// Default connection checkout timeout (ms).
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Pooled connection handle.
pub type SqliteConnection = PooledConnection<SqliteConnectionManager>;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` miniapp store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `pool_size` is within `1..=MAX_POOL_SIZE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Maximum open connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Connection checkout timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default pool size.
const fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

/// Returns the default checkout timeout.
const fn default_connection_timeout_ms() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_MS
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default tuning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
        }
    }

    /// Validates path and pool limits.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when a limit is violated.
    pub fn validate(&self) -> Result<(), SqliteStoreError> {
        validate_store_path(&self.path)?;
        if self.pool_size == 0 || self.pool_size > MAX_POOL_SIZE {
            return Err(SqliteStoreError::Invalid(format!(
                "pool_size must be between 1 and {MAX_POOL_SIZE}"
            )));
        }
        if self.connection_timeout_ms == 0 {
            return Err(SqliteStoreError::Invalid(
                "connection_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Bounded pool of configured `SQLite` connections.
#[derive(Clone)]
pub struct SqlitePool {
    /// Underlying r2d2 pool.
    pool: Pool<SqliteConnectionManager>,
    /// Database file path.
    path: PathBuf,
}

impl SqlitePool {
    /// Opens the pool, creating the database file and parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when validation fails or the initial
    /// connections cannot be opened.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        config.validate()?;
        ensure_parent_dir(&config.path)?;
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let pragmas = ConnectionPragmas::from_config(config);
        let manager = SqliteConnectionManager::file(&config.path)
            .with_flags(flags)
            .with_init(move |connection| pragmas.apply(connection));
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .test_on_check_out(true)
            .build(manager)?;
        Ok(Self {
            pool,
            path: config.path.clone(),
        })
    }

    /// Returns the database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks out a connection, waiting up to the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Pool`] when no connection becomes available.
    pub fn connection(&self) -> Result<SqliteConnection, SqliteStoreError> {
        self.pool.get().map_err(SqliteStoreError::from)
    }

    /// Runs `work` on a checked-out connection outside any transaction.
    ///
    /// # Errors
    ///
    /// Returns the checkout error or the error produced by `work`.
    pub fn with_connection<T>(
        &self,
        work: impl FnOnce(&Connection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let connection = self.connection()?;
        work(&connection)
    }

    /// Runs `work` inside an immediate (write-locking) transaction.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `work` after rolling back, or the commit
    /// error.
    pub fn with_transaction<T>(
        &self,
        work: impl FnOnce(&Transaction<'_>) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let mut connection = self.connection()?;
        run_in_transaction(&mut connection, TransactionBehavior::Immediate, work)
    }

    /// Runs `work` inside a deferred transaction for a consistent read view.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `work`.
    pub fn with_read_transaction<T>(
        &self,
        work: impl FnOnce(&Transaction<'_>) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let mut connection = self.connection()?;
        run_in_transaction(&mut connection, TransactionBehavior::Deferred, work)
    }
}

/// Runs `work` in a transaction; drop without commit rolls back.
pub(crate) fn run_in_transaction<T>(
    connection: &mut Connection,
    behavior: TransactionBehavior,
    work: impl FnOnce(&Transaction<'_>) -> Result<T, SqliteStoreError>,
) -> Result<T, SqliteStoreError> {
    let tx = connection.transaction_with_behavior(behavior).map_err(db_error)?;
    let value = work(&tx)?;
    tx.commit().map_err(db_error)?;
    Ok(value)
}

// ============================================================================
// SECTION: Pragmas
// ============================================================================

/// Per-connection pragma settings captured from config.
#[derive(Debug, Clone, Copy)]
struct ConnectionPragmas {
    /// Journal mode.
    journal_mode: SqliteJournalMode,
    /// Sync mode.
    sync_mode: SqliteSyncMode,
    /// Busy timeout.
    busy_timeout: Duration,
}

impl ConnectionPragmas {
    /// Captures pragma settings from config.
    const fn from_config(config: &SqliteStoreConfig) -> Self {
        Self {
            journal_mode: config.journal_mode,
            sync_mode: config.sync_mode,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }

    /// Applies pragmas required for durability and integrity.
    fn apply(&self, connection: &mut Connection) -> rusqlite::Result<()> {
        connection.busy_timeout(self.busy_timeout)?;
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        connection
            .execute_batch(&format!("PRAGMA journal_mode = {};", self.journal_mode.pragma_value()))?;
        connection
            .execute_batch(&format!("PRAGMA synchronous = {};", self.sync_mode.pragma_value()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Path Validation
// ============================================================================

/// Ensures the parent directory exists for the store path.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}
