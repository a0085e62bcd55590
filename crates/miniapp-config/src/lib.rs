// crates/miniapp-config/src/lib.rs
// ============================================================================
// Module: Miniapp Config Library
// Description: Canonical configuration model for the miniapp host.
// Purpose: Load, validate, and resolve runtime configuration once at startup.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! The configuration is read from TOML, validated fail-closed, and then passed
//! by reference into the store, schema manager, and authorization guard.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Configuration model and loader.
pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AdminKeyConfig;
pub use config::AdminKeySource;
pub use config::AuditConfig;
pub use config::ConfigError;
pub use config::LimitsConfig;
pub use config::MiniAppConfig;
pub use config::ResolvedAdminKey;
pub use config::StoreConfig;
