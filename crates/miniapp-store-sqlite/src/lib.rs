// crates/miniapp-store-sqlite/src/lib.rs
// ============================================================================
// Module: Miniapp SQLite Store Library
// Description: SQLite persistence for identities, apps, and usage events.
// Purpose: Expose the pooled store, schema manager, and their configuration.
// Dependencies: crate::{error, pool, schema, store, timestamp}
// ============================================================================

//! ## Overview
//! A single `SQLite` file holds the `users`, `apps`, and `access_logs` tables.
//! Open a [`SqliteMiniAppStore`], run [`SqliteMiniAppStore::ensure_schema`]
//! once, reconcile the admin key, then serve requests through the core store
//! traits.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Error taxonomy.
pub mod error;
/// Connection pool and store configuration.
pub mod pool;
/// Schema introspection and convergence.
pub mod schema;
/// Store trait implementations.
pub mod store;
/// Timestamp decoding.
pub mod timestamp;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::SqliteStoreError;
pub use pool::SqliteJournalMode;
pub use pool::SqlitePool;
pub use pool::SqliteStoreConfig;
pub use pool::SqliteSyncMode;
pub use schema::AdminReconcileOutcome;
pub use schema::CurrentTable;
pub use schema::SchemaAction;
pub use schema::SchemaManager;
pub use schema::SchemaOptions;
pub use schema::SchemaReport;
pub use schema::SchemaSnapshot;
pub use schema::SchemaState;
pub use store::SqliteMiniAppStore;
