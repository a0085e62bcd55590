// crates/miniapp-core/src/core/mod.rs
// ============================================================================
// Module: Miniapp Core Types
// Description: Canonical tenant, app, and usage structures.
// Purpose: Provide stable, serializable types shared by stores and services.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Core types are the single source of truth for the records the store
//! persists and the service layer returns. Derived statistics live next to
//! the raw log types so both sides agree on action labels.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod identifiers;
pub mod model;
pub mod stats;
pub mod time;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::AppSlug;
pub use identifiers::UserId;
pub use model::AccessAction;
pub use model::AccessLogEntry;
pub use model::App;
pub use model::AppScope;
pub use model::AppSummary;
pub use model::User;
pub use stats::StatsRecord;
pub use stats::UsageStats;
pub use time::UnixMillis;
pub use validation::InputLimits;
pub use validation::ValidationError;
