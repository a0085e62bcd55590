// crates/miniapp-service/src/auth.rs
// ============================================================================
// Module: Key Authorization
// Description: Bearer key resolution and tenant ownership policy.
// Purpose: Decide who a caller is and which tenant they may act on.
// Dependencies: miniapp-core, subtle, thiserror
// ============================================================================

//! ## Overview
//! A presented key resolves to a [`User`] by exact match. When nothing matches
//! and the key equals the configured bootstrap secret, the caller is treated
//! as the admin even if the identity table has not caught up yet.
//!
//! Ownership policy: ordinary tenants act only on their own rows and are
//! always self-scoped. The admin may name any target tenant explicitly;
//! omitting the target scopes the request to the admin's own tenant, except
//! for listings, which then cover every tenant.
//!
//! All decisions fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use miniapp_core::AppScope;
use miniapp_core::IdentityStore;
use miniapp_core::StoreError;
use miniapp_core::UnixMillis;
use miniapp_core::User;
use miniapp_core::UserId;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    /// Key resolution only.
    ResolveIdentity,
    /// Create or replace an app.
    SaveApp,
    /// Read one app.
    FetchApp,
    /// Enumerate apps.
    ListApps,
    /// Remove an app.
    DeleteApp,
    /// Issue a new tenant key.
    CreateIdentity,
    /// Enumerate tenants.
    ListIdentities,
    /// Read usage counters.
    AggregateStats,
    /// Sign a stateless link.
    Generate,
}

impl ServiceAction {
    /// Returns a stable label for audit output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ResolveIdentity => "resolve_identity",
            Self::SaveApp => "save_app",
            Self::FetchApp => "fetch_app",
            Self::ListApps => "list_apps",
            Self::DeleteApp => "delete_app",
            Self::CreateIdentity => "create_identity",
            Self::ListIdentities => "list_identities",
            Self::AggregateStats => "aggregate_stats",
            Self::Generate => "generate",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication or authorization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Missing or unknown key.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Caller is known but may not perform the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Identity lookup failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Authorizer
// ============================================================================

/// Resolves presented keys to identities.
///
/// # Invariants
/// - `Debug` output never includes the bootstrap secret.
#[derive(Clone)]
pub struct KeyAuthorizer {
    /// Configured admin secret; `None` disables the bootstrap fallback.
    bootstrap_secret: Option<String>,
}

impl KeyAuthorizer {
    /// Creates an authorizer with a bootstrap secret. An empty secret
    /// disables the fallback.
    #[must_use]
    pub fn new(bootstrap_secret: impl Into<String>) -> Self {
        let secret = bootstrap_secret.into();
        Self {
            bootstrap_secret: (!secret.is_empty()).then_some(secret),
        }
    }

    /// Creates an authorizer that only trusts the identity table.
    #[must_use]
    pub const fn without_bootstrap() -> Self {
        Self {
            bootstrap_secret: None,
        }
    }

    /// Resolves a presented key to a user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] when the key is empty or
    /// unknown, and [`AuthError::Store`] when the lookup fails.
    pub fn resolve<S>(&self, store: &S, key: &str) -> Result<User, AuthError>
    where
        S: IdentityStore + ?Sized,
    {
        if key.is_empty() {
            return Err(AuthError::Unauthenticated("missing key".to_string()));
        }
        if let Some(user) = store.user_by_key(key)? {
            return Ok(user);
        }
        if !self.is_bootstrap_secret(key) {
            return Err(AuthError::Unauthenticated("unknown key".to_string()));
        }
        match store.user_by_id(UserId::ADMIN)? {
            Some(admin) => Ok(admin),
            None => Ok(User {
                id: UserId::ADMIN,
                key: key.to_string(),
                comment: Some("bootstrap".to_string()),
                created_at: UnixMillis::new(0),
            }),
        }
    }

    /// Compares `key` with the bootstrap secret in constant time.
    fn is_bootstrap_secret(&self, key: &str) -> bool {
        self.bootstrap_secret
            .as_deref()
            .is_some_and(|secret| bool::from(secret.as_bytes().ct_eq(key.as_bytes())))
    }
}

impl fmt::Debug for KeyAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAuthorizer")
            .field("bootstrap", &self.bootstrap_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// SECTION: Ownership Policy
// ============================================================================

/// Returns the tenant a request acts on.
///
/// # Errors
///
/// Returns [`AuthError::Unauthorized`] when a non-admin names another tenant.
pub fn authorize_target(identity: &User, target: Option<UserId>) -> Result<UserId, AuthError> {
    match target {
        None => Ok(identity.id),
        Some(owner) if owner == identity.id || identity.is_admin() => Ok(owner),
        Some(_) => Err(AuthError::Unauthorized("cross-tenant access requires admin".to_string())),
    }
}

/// Returns the listing scope for a request.
///
/// # Errors
///
/// Returns [`AuthError::Unauthorized`] when a non-admin names another tenant.
pub fn list_scope(identity: &User, target: Option<UserId>) -> Result<AppScope, AuthError> {
    if identity.is_admin() && target.is_none() {
        return Ok(AppScope::All);
    }
    authorize_target(identity, target).map(AppScope::Owner)
}

/// Requires the admin identity.
///
/// # Errors
///
/// Returns [`AuthError::Unauthorized`] for every other identity.
pub fn require_admin(identity: &User) -> Result<(), AuthError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(AuthError::Unauthorized("admin only".to_string()))
    }
}
