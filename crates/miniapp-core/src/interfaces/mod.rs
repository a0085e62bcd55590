// crates/miniapp-core/src/interfaces/mod.rs
// ============================================================================
// Module: Miniapp Interfaces
// Description: Backend-agnostic interfaces for identity, app, and usage storage.
// Purpose: Define the contract surfaces the service layer depends on.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Interfaces describe tenant-scoped storage without leaking backend details.
//! Every mutating call is atomic: it either completes or leaves no trace.
//! Authorization is not a store concern; callers resolve and check tenants
//! before invoking any mutation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::AccessAction;
use crate::core::App;
use crate::core::AppScope;
use crate::core::AppSlug;
use crate::core::AppSummary;
use crate::core::UsageStats;
use crate::core::User;
use crate::core::UserId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Store errors.
///
/// # Invariants
/// - Messages never embed bearer keys or HTML payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Backend engine error.
    #[error("store db error: {0}")]
    Db(String),
    /// Connection could not be acquired.
    #[error("store connection unavailable: {0}")]
    Pool(String),
    /// Invalid input or stored data.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Identity creation used a key that is already assigned.
    #[error("key already exists")]
    KeyAlreadyExists,
    /// App write referenced a tenant that does not exist.
    #[error("unknown owner: {0}")]
    UnknownOwner(UserId),
    /// Schema convergence failed; the store must not serve requests.
    #[error("store schema error: {0}")]
    Schema(String),
}

// ============================================================================
// SECTION: Identity Store
// ============================================================================

/// Tenant identity persistence.
pub trait IdentityStore {
    /// Looks up a user by exact key match.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn user_by_key(&self, key: &str) -> Result<Option<User>, StoreError>;

    /// Looks up a user by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Creates a user with an auto-assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyAlreadyExists`] when `key` is taken; no row is
    /// created in that case.
    fn create_user(&self, key: &str, comment: Option<&str>) -> Result<UserId, StoreError>;

    /// Returns every user ordered by identifier ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

// ============================================================================
// SECTION: App Store
// ============================================================================

/// Tenant-scoped app persistence keyed by `(slug, owner)`.
pub trait AppStore {
    /// Inserts or updates the app for `(slug, owner)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownOwner`] when `owner` does not exist.
    fn upsert_app(&self, slug: &AppSlug, owner: UserId, html: &str) -> Result<(), StoreError>;

    /// Fetches the app for `(slug, owner)`; never another tenant's row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn fetch_app(&self, slug: &AppSlug, owner: UserId) -> Result<Option<App>, StoreError>;

    /// Lists app summaries in scope, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_apps(&self, scope: AppScope) -> Result<Vec<AppSummary>, StoreError>;

    /// Deletes the app for `(slug, owner)`. Returns whether a row was removed;
    /// absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_app(&self, slug: &AppSlug, owner: UserId) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Access Log
// ============================================================================

/// Append-only usage log with derived per-tenant statistics.
pub trait AccessLog {
    /// Appends one usage event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the append fails.
    fn record_event(
        &self,
        owner: Option<UserId>,
        action: AccessAction,
        slug: Option<&AppSlug>,
    ) -> Result<(), StoreError>;

    /// Computes per-tenant action counts merged with live app counts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when aggregation fails.
    fn aggregate_stats(&self) -> Result<UsageStats, StoreError>;
}
