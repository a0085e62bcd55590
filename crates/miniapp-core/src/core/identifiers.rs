// crates/miniapp-core/src/core/identifiers.rs
// ============================================================================
// Module: Miniapp Identifiers
// Description: Opaque identifiers for tenants and their apps.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Tenants are identified by a 1-based numeric [`UserId`]; the reserved value
//! `1` is the administrator. Apps are identified by a tenant-chosen
//! [`AppSlug`] which is only unique within its owning tenant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Tenant (user) identifier.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
/// - [`UserId::ADMIN`] (`1`) is the permanently privileged identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(NonZeroU64);

impl UserId {
    /// Reserved administrator identity.
    pub const ADMIN: Self = Self(NonZeroU64::MIN);

    /// Creates a new user identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a user identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Creates a user identifier from a signed database value.
    ///
    /// Returns `None` for zero or negative values.
    #[must_use]
    pub fn from_i64(raw: i64) -> Option<Self> {
        u64::try_from(raw).ok().and_then(Self::from_raw)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Returns the identifier as a signed database value.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        i64::try_from(self.0.get()).unwrap_or(i64::MAX)
    }

    /// Returns true for the reserved administrator identity.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        self.0.get() == Self::ADMIN.0.get()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

/// Tenant-chosen app identifier.
///
/// # Invariants
/// - Unique only within a single owning tenant; `(slug, user_id)` is the key.
/// - Construction does not validate; use [`crate::InputLimits::slug`] at trust
///   boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppSlug(String);

impl AppSlug {
    /// Creates a slug without validation.
    #[must_use]
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AppSlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
