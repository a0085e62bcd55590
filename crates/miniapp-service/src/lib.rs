// crates/miniapp-service/src/lib.rs
// ============================================================================
// Module: Miniapp Service Library
// Description: Authorization, auditing, and tenant-scoped operations.
// Purpose: Give the request-routing layer one fail-closed entry point.
// Dependencies: crate::{audit, auth, error, service}
// ============================================================================

//! ## Overview
//! The routing layer calls [`MiniAppService`] with the presented key for every
//! request. The service resolves the key through [`KeyAuthorizer`], applies the
//! ownership policy, and only then touches the store. Rejected requests have no
//! side effects beyond an audit event.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod error;
pub mod service;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::AuthAuditEvent;
pub use audit::FileAuditSink;
pub use audit::LifecycleAuditEvent;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::StoreAuditEvent;
pub use audit::audit_sink_from_config;
pub use audit::key_fingerprint;
pub use auth::AuthError;
pub use auth::KeyAuthorizer;
pub use auth::ServiceAction;
pub use error::ServiceError;
pub use service::IdentityStats;
pub use service::MiniAppService;
pub use service::StartupReport;
pub use service::bootstrap_store;
