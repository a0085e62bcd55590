// crates/miniapp-core/src/core/model.rs
// ============================================================================
// Module: Miniapp Records
// Description: User, app, and access log records.
// Purpose: Define the persisted entities and their lifecycle invariants.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Three entities are persisted: users (tenants, keyed by an opaque bearer
//! key), apps (HTML blobs keyed by `(slug, user_id)`), and access log entries
//! (append-only usage events). These types carry no behavior beyond labels.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AppSlug;
use crate::core::identifiers::UserId;
use crate::core::time::UnixMillis;

// ============================================================================
// SECTION: Users
// ============================================================================

/// Tenant identity record.
///
/// # Invariants
/// - `key` is globally unique and is the sole credential for the tenant.
/// - Exactly one user holds [`UserId::ADMIN`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Surrogate identifier.
    pub id: UserId,
    /// Opaque bearer key.
    pub key: String,
    /// Operator-supplied note.
    pub comment: Option<String>,
    /// Creation time.
    pub created_at: UnixMillis,
}

impl User {
    /// Returns true when this user is the reserved administrator.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.id.is_admin()
    }
}

// ============================================================================
// SECTION: Apps
// ============================================================================

/// Stored app record.
///
/// # Invariants
/// - `(slug, user_id)` is unique.
/// - `updated_at >= created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    /// Tenant-chosen identifier.
    pub slug: AppSlug,
    /// Owning tenant.
    pub user_id: UserId,
    /// Opaque HTML payload.
    pub html_content: String,
    /// Creation time.
    pub created_at: UnixMillis,
    /// Last update time.
    pub updated_at: UnixMillis,
}

/// App listing entry (content omitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSummary {
    /// Tenant-chosen identifier.
    pub slug: AppSlug,
    /// Owning tenant.
    pub user_id: UserId,
    /// Last update time.
    pub updated_at: UnixMillis,
}

/// Scope for app enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppScope {
    /// Every app across every tenant (administrator view).
    All,
    /// Apps owned by a single tenant.
    Owner(UserId),
}

// ============================================================================
// SECTION: Access Log
// ============================================================================

/// Tracked usage action.
///
/// # Invariants
/// - Labels are stable; they are persisted in the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    /// A stateless signed link was generated.
    Generate,
    /// A stateless signed link was opened.
    ViewStateless,
    /// A stored app was opened.
    ViewPersistent,
}

impl AccessAction {
    /// All actions in label order.
    pub const ALL: [Self; 3] = [Self::Generate, Self::ViewStateless, Self::ViewPersistent];

    /// Returns the persisted label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::ViewStateless => "view_stateless",
            Self::ViewPersistent => "view_persistent",
        }
    }

    /// Parses a persisted label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == label)
    }
}

/// Append-only usage event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// Monotonic surrogate identifier.
    pub id: i64,
    /// Attributed tenant, when known.
    pub user_id: Option<UserId>,
    /// Tracked action.
    pub action: AccessAction,
    /// App slug for persistent views.
    pub slug: Option<AppSlug>,
    /// Event time.
    pub timestamp: UnixMillis,
}
